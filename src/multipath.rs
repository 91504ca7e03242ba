// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The multipath path-selection engine's feedback contract (§6, §9).
//!
//! Its internal policy -- round-robin, penalty bitmap, path recycling --
//! is out of scope (§1's Non-goals); this crate only depends on the
//! `notify` half of the capability set `{notify, select_next_path}`
//! described in §9. Concrete engines are polymorphic over that capability
//! set and differ only in internal state, which is why the core only ever
//! holds a `&mut dyn MultipathEngine`.

/// A path's feedback classification for one event, matching the four
/// `PATH_*` constants named in §4.G/§6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathFeedback {
    Good,
    Ecn,
    Nack,
    Timeout,
}

/// Opaque identifier for one of the equal-cost paths a flow sprays across.
pub type PathId = u64;

/// The feedback contract the core consumes from the multipath engine.
///
/// The core calls `notify` once per ACK/NACK/timeout and never inspects
/// the engine's internal routing state; `select_next_path` exists on the
/// trait for completeness with §9's capability set but is not called by
/// this crate, which only produces feedback, it doesn't consume routing
/// decisions.
pub trait MultipathEngine {
    fn notify(&mut self, path_id: PathId, feedback: PathFeedback);

    fn select_next_path(&mut self) -> PathId;
}

/// A `MultipathEngine` that discards every notification; useful for
/// integrations or tests that don't care about path steering.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMultipathEngine;

impl MultipathEngine for NoopMultipathEngine {
    #[inline]
    fn notify(&mut self, _path_id: PathId, _feedback: PathFeedback) {}

    #[inline]
    fn select_next_path(&mut self) -> PathId {
        0
    }
}
