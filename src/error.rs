// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The crate's error model (§7).
//!
//! Transient, Recoverable, and Degradation outcomes (NACKs, out-of-order
//! ACKs, `loss_recovery_mode` entry, Quick Adapt firings) never produce an
//! `Err`; they are folded into ordinary state mutations and `Publisher`
//! notifications. Only Fatal conditions -- the ones that indicate the core
//! itself has been driven into an inconsistent state -- are represented
//! here, and handlers that would observe one must tear the flow down rather
//! than continue.

/// A fatal, invariant-violating condition (§7, class 4).
///
/// Every per-ACK handler in this crate returns `Result<(), FatalError>`.
/// `Ok(())` is the overwhelmingly common case; an `Err` means the caller
/// must tear the flow down, since the core makes no attempt to repair its
/// own state after one of these fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FatalError {
    /// `cwnd` was observed outside of `[min_cwnd, maxwnd]` after the bounds
    /// clamp in §4.D ran. This should be unreachable; if it fires, the clamp
    /// itself or one of its callers has a bug.
    #[error("congestion window {cwnd} outside of bounds [{min_cwnd}, {maxwnd}] after clamp")]
    WindowOutOfBounds {
        cwnd: u64,
        min_cwnd: u64,
        maxwnd: u64,
    },

    /// A caller attempted to move `base_rtt` upward (I2). The Delay
    /// Estimator only ever shrinks `base_rtt`; an increase request is a
    /// caller bug, most likely a route-change handler that wasn't updated
    /// to respect Open Question (iii) in §9.
    #[error("attempted to increase base_rtt from {current} to {attempted}")]
    BaseRttIncreaseAttempted { current: u64, attempted: u64 },

    /// A scheduler callback fired carrying a flow identity that does not
    /// match the flow it was registered against.
    #[error("scheduler callback flow identity mismatch: expected {expected}, got {actual}")]
    FlowIdentityMismatch { expected: u64, actual: u64 },

    /// A timer or ACK callback fired for a flow that has already completed
    /// teardown (§5, Cancellation). The host is responsible for cancelling
    /// outstanding timers by flow identity before dropping a flow; this
    /// error indicates that contract was not honored.
    #[error("callback received for flow {flow_id} after teardown")]
    CallbackAfterTeardown { flow_id: u64 },
}
