// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Quadrant Classifier (§4.C) and the Fast-Increase qualification rule
//! that rides alongside it (§4.C.1).
//!
//! Classification always uses **raw** delay, not the EWMA -- that's what
//! lets the classifier react within one ACK to fresh conditions. Resist the
//! temptation to thread `avg_delay` in here; the decrease *magnitude* in
//! §4.D is the only place the EWMA belongs. Collapsing the two onto a
//! single delay signal is exactly the bug §9 warns implementers about.

use crate::time::PicoDuration;

/// One of the five actions a single ACK can select (§4.C).
///
/// The discriminants double as the `quadrant` trace field values named in
/// §6 (`fair_inc=0, prop_inc=1, mult_dec=2, noop=3, fast_inc=4`). Quick
/// Adapt's `qa=5` is a distinct event type (see [`crate::event`]) rather
/// than a member of this enum, since it isn't selected by the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    FairIncrease = 0,
    ProportionalIncrease = 1,
    MultiplicativeDecrease = 2,
    Noop = 3,
    FastIncrease = 4,
}

/// Below this, a packet's queuing delay is treated as "the network is
/// empty" for the purposes of fast-increase qualification (§4.C.1).
const FAST_INCREASE_DELAY_THRESHOLD: PicoDuration = PicoDuration::from_micros(1);

/// Selects an action from `(ecn, raw_delay vs target)`, per the table in
/// §4.C. Fast-increase qualification is evaluated separately by
/// [`FastIncreaseTracker`] and takes priority when active, since it applies
/// "regardless of ECN" per the table's final row.
pub fn classify(ecn: bool, raw_delay: PicoDuration, target_qdelay: PicoDuration) -> Action {
    match (ecn, raw_delay < target_qdelay) {
        (false, true) => Action::ProportionalIncrease,
        (false, false) => Action::FairIncrease,
        (true, true) => Action::Noop,
        (true, false) => Action::MultiplicativeDecrease,
    }
}

/// Tracks the run of near-zero-delay ACKs that qualifies a flow for
/// fast-increase mode (§4.C.1).
///
/// While `raw_delay < 1us`, newly-acked bytes accumulate in a counter; once
/// the counter exceeds `cwnd`, the flow is in fast-increase mode until the
/// first ACK that doesn't qualify (`raw_delay >= 1us`). While qualified,
/// each ACK bypasses the fulfill buffer entirely and adds
/// `newly_acked * fi_scale` directly to `cwnd`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FastIncreaseTracker {
    qualifying_bytes: u64,
    active: bool,
}

impl FastIncreaseTracker {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Updates the tracker for one ACK and returns whether fast-increase
    /// applies to *this* ACK (i.e. the state after the update).
    pub fn on_ack(&mut self, raw_delay: PicoDuration, newly_acked: u64, cwnd: u64) -> bool {
        if raw_delay < FAST_INCREASE_DELAY_THRESHOLD {
            self.qualifying_bytes = self.qualifying_bytes.saturating_add(newly_acked);
            if self.qualifying_bytes > cwnd {
                self.active = true;
            }
        } else {
            // First non-qualifying ACK: leave fast-increase mode and reset
            // the run so a later burst of near-zero delay has to
            // re-accumulate a full cwnd's worth before re-qualifying.
            self.qualifying_bytes = 0;
            self.active = false;
        }
        self.active
    }
}
