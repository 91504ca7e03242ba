// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The trace sink (§6) and Quick Adapt event record, expressed as a
//! `Publisher` trait the way `s2n_quic_core::recovery::congestion_controller`
//! expresses its own observability hooks: the core depends on the trait,
//! never on a concrete logging or metrics backend.

use crate::time::{PicoDuration, Timestamp};

/// The `quadrant` field named in §6's trace sink record. `Qa` is carried as
/// its own record type (see [`QaRecord`]) rather than a `FulfillRecord`
/// variant, since Quick Adapt isn't selected by the classifier -- this
/// matches the enum only in spirit, not in representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    FairIncrease = 0,
    ProportionalIncrease = 1,
    MultiplicativeDecrease = 2,
    Noop = 3,
    FastIncrease = 4,
}

impl From<crate::quadrant::Action> for Quadrant {
    fn from(action: crate::quadrant::Action) -> Self {
        use crate::quadrant::Action;
        match action {
            Action::FairIncrease => Quadrant::FairIncrease,
            Action::ProportionalIncrease => Quadrant::ProportionalIncrease,
            Action::MultiplicativeDecrease => Quadrant::MultiplicativeDecrease,
            Action::Noop => Quadrant::Noop,
            Action::FastIncrease => Quadrant::FastIncrease,
        }
    }
}

/// One record per fulfill adjustment (§6).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FulfillRecord {
    pub time: Timestamp,
    pub flow_id: u64,
    pub cwnd: u64,
    pub in_flight: u64,
    pub bdp: u64,
    pub maxwnd: u64,
    pub avg_delay: PicoDuration,
    pub raw_delay: PicoDuration,
    pub target_qdelay: PicoDuration,
    pub base_rtt: PicoDuration,
    pub ecn: bool,
    pub quadrant: Quadrant,
    pub inc_bytes_applied: f64,
}

/// A separate record type for Quick Adapt firings (§6).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QaRecord {
    pub time: Timestamp,
    pub flow_id: u64,
    pub cwnd_before: u64,
    pub cwnd_after: u64,
    pub bytes_to_ignore: u64,
}

/// A record of a SLEEK recovery-mode transition, useful for the
/// observability surface §7 requires for Recoverable-class outcomes even
/// though recovery itself is handled automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryRecord {
    pub flow_id: u64,
    pub entered: bool,
    pub recovery_seqno: u64,
}

/// Observes fulfill adjustments, Quick Adapt firings, and SLEEK recovery
/// transitions without the core depending on any particular sink.
pub trait Publisher {
    fn on_fulfill(&mut self, record: FulfillRecord);
    fn on_quick_adapt(&mut self, record: QaRecord);
    fn on_recovery_transition(&mut self, record: RecoveryRecord);
}

/// A `Publisher` that discards every record; the default for callers that
/// don't want tracing overhead on the hot path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    #[inline]
    fn on_fulfill(&mut self, _record: FulfillRecord) {}
    #[inline]
    fn on_quick_adapt(&mut self, _record: QaRecord) {}
    #[inline]
    fn on_recovery_transition(&mut self, _record: RecoveryRecord) {}
}

/// A `Publisher` backed by `tracing`, emitting one structured event per
/// record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

impl Publisher for TracingPublisher {
    fn on_fulfill(&mut self, record: FulfillRecord) {
        tracing::trace!(
            flow_id = record.flow_id,
            cwnd = record.cwnd,
            in_flight = record.in_flight,
            bdp = record.bdp,
            maxwnd = record.maxwnd,
            avg_delay_ps = record.avg_delay.as_picos(),
            raw_delay_ps = record.raw_delay.as_picos(),
            target_qdelay_ps = record.target_qdelay.as_picos(),
            base_rtt_ps = record.base_rtt.as_picos(),
            ecn = record.ecn,
            quadrant = record.quadrant as u8,
            "fulfill adjustment"
        );
    }

    fn on_quick_adapt(&mut self, record: QaRecord) {
        tracing::debug!(
            flow_id = record.flow_id,
            cwnd_before = record.cwnd_before,
            cwnd_after = record.cwnd_after,
            bytes_to_ignore = record.bytes_to_ignore,
            "quick adapt fired"
        );
    }

    fn on_recovery_transition(&mut self, record: RecoveryRecord) {
        tracing::debug!(
            flow_id = record.flow_id,
            entered = record.entered,
            recovery_seqno = record.recovery_seqno,
            "loss recovery mode transition"
        );
    }
}
