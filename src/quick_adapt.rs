// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Quick Adapt (§4.E): a one-shot emergency reset, not a new mode. After
//! the stale-feedback mask drains, the flow re-enters the normal quadrant
//! loop from the much smaller `cwnd`. The two-part fire guard (something
//! bad *and* the flow is severely underperforming) exists so QA only fires
//! in real emergencies, not on every isolated ECN mark.

use crate::{
    oracle::Params,
    time::{PicoDuration, Timestamp},
};

/// Tracks achieved bytes, the evaluation interval, and the stale-feedback
/// mask for one flow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuickAdapt {
    achieved_bytes: u64,
    last_eval_time: Timestamp,
    /// Sticky trigger set by a NACK, timeout, or `raw_delay > qa_threshold`
    /// (§4.E); consumed at the next evaluation boundary.
    trigger: bool,
    bytes_to_ignore: u64,
    bytes_ignored: u64,
}

/// The result of a Quick Adapt evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    pub new_cwnd: u64,
    pub bytes_to_ignore: u64,
}

impl QuickAdapt {
    #[inline]
    pub fn new(now: Timestamp) -> Self {
        Self {
            achieved_bytes: 0,
            last_eval_time: now,
            trigger: false,
            bytes_to_ignore: 0,
            bytes_ignored: 0,
        }
    }

    /// Accumulates bytes acknowledged toward the current evaluation window.
    #[inline]
    pub fn record_achieved(&mut self, newly_acked: u64) {
        self.achieved_bytes = self.achieved_bytes.saturating_add(newly_acked);
    }

    /// Sets the sticky trigger from a NACK or timeout (§4.G).
    #[inline]
    pub fn set_trigger(&mut self) {
        self.trigger = true;
    }

    /// `qa_eval_interval = base_rtt + target_Qdelay` (§5).
    #[inline]
    pub fn eval_interval(base_rtt: PicoDuration, params: &Params) -> PicoDuration {
        base_rtt + params.target_qdelay
    }

    /// Evaluates the fire condition and resets state if it fires:
    ///
    /// ```text
    /// FIRE if (trigger OR loss OR raw_delay > 4*target_Qdelay)
    ///    AND (achieved_bytes < maxwnd >> qa_gate)
    /// ```
    ///
    /// `raw_delay` is passed in as the most recent sample so a single
    /// severe ACK can fire QA opportunistically between scheduled
    /// evaluation boundaries, per §4.E ("and opportunistically on NACK or
    /// delay > qa_threshold").
    pub fn maybe_fire(
        &mut self,
        now: Timestamp,
        base_rtt: PicoDuration,
        maxwnd: u64,
        in_flight: u64,
        raw_delay: Option<PicoDuration>,
        params: &Params,
    ) -> Option<Fired> {
        let interval_elapsed =
            now.saturating_duration_since(self.last_eval_time) >= Self::eval_interval(base_rtt, params);
        let delay_emergency = raw_delay.is_some_and(|d| d > params.qa_threshold);

        let condition_met = self.trigger || interval_elapsed || delay_emergency;
        if !condition_met {
            return None;
        }

        let underperforming = self.achieved_bytes < (maxwnd >> params.qa_gate_shift);
        // The interval boundary always resets the evaluation window even
        // if the flow isn't underperforming, so `achieved_bytes` reflects
        // only the most recent window rather than accumulating forever.
        if interval_elapsed {
            self.achieved_bytes = 0;
            self.last_eval_time = now;
        }
        self.trigger = false;

        if !underperforming {
            return None;
        }

        let new_cwnd = self.achieved_bytes.max(params.min_cwnd());
        self.achieved_bytes = 0;
        self.last_eval_time = now;
        self.bytes_to_ignore = in_flight;
        self.bytes_ignored = 0;

        Some(Fired {
            new_cwnd,
            bytes_to_ignore: in_flight,
        })
    }

    /// `true` while the stale-feedback mask is still absorbing
    /// already-in-flight ACKs (I5).
    #[inline]
    pub fn mask_active(&self) -> bool {
        self.bytes_ignored < self.bytes_to_ignore
    }

    /// Consumes one ACK's worth of bytes against the mask. Must be called
    /// instead of the normal quadrant/window pipeline while
    /// [`Self::mask_active`] is `true`.
    #[inline]
    pub fn consume_mask(&mut self, newly_acked: u64) {
        self.bytes_ignored = self.bytes_ignored.saturating_add(newly_acked);
    }
}
