// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Loss Detector, SLEEK (§4.F).
//!
//! With per-packet spraying across N paths, reordering up to ~N positions
//! is normal. A fixed dup-ack-3 rule would produce constant false
//! retransmits, so the reorder threshold is scaled to `cwnd` instead,
//! riding with the reorder horizon rather than a packet count fixed at
//! single-path RTT assumptions.

use crate::{
    oracle::Params,
    time::{PicoDuration, Timestamp},
};
use std::ops::Range;

/// `min_retx_cfg` in the threshold formula.
const MIN_RETX_PACKETS: u64 = 5;
/// `loss_retx_factor`: margin above one full path-rotation. Lower would
/// false-positive on ordinary reordering; higher would delay detection by
/// a full window.
const LOSS_RETX_FACTOR: f64 = 1.5;

/// Per-flow SLEEK state.
#[derive(Clone, Debug, PartialEq)]
pub struct Sleek {
    out_of_order_count: u64,
    loss_recovery_mode: bool,
    recovery_seqno: u64,
    last_probe_time: Option<Timestamp>,
}

impl Sleek {
    #[inline]
    pub fn new() -> Self {
        Self {
            out_of_order_count: 0,
            loss_recovery_mode: false,
            recovery_seqno: 0,
            last_probe_time: None,
        }
    }

    #[inline]
    pub fn in_recovery(&self) -> bool {
        self.loss_recovery_mode
    }

    #[inline]
    pub fn recovery_seqno(&self) -> u64 {
        self.recovery_seqno
    }

    /// `threshold = max(min_retx_cfg, min(loss_retx_factor * cwnd, maxwnd))`,
    /// expressed in packets: `out_of_order_count` counts out-of-order ACKs,
    /// not bytes, so `cwnd` and `maxwnd` are normalized by `avg_pkt_size`
    /// before the comparison (S5: cwnd = 600KB at 4KB packets = 150 pkts,
    /// threshold = 1.5*150 = 225 pkts). `min_retx_cfg`/`loss_retx_factor`
    /// are fixed constants, not part of the `Params` bundle (§4.A's
    /// `thresholds` covers `qa_threshold`/`adjust_bytes_threshold`, not this
    /// one), so this takes no `Params` argument.
    pub fn threshold(cwnd: u64, maxwnd: u64, avg_pkt_size: u64) -> u64 {
        debug_assert!(avg_pkt_size > 0);
        let cwnd_pkts = cwnd as f64 / avg_pkt_size as f64;
        let maxwnd_pkts = maxwnd as f64 / avg_pkt_size as f64;
        let scaled = cwnd_pkts * LOSS_RETX_FACTOR;
        (scaled.min(maxwnd_pkts)).max(MIN_RETX_PACKETS as f64).round() as u64
    }

    /// Records an out-of-order ACK and, if the cwnd-scaled threshold is
    /// crossed, no recovery is already underway, and `rtx_queue` is empty
    /// (§4.F's third guard -- a pending probe-confirmed-loss range must
    /// drain before a second, possibly overlapping, range is pushed), enters
    /// recovery mode and returns the sequence-number range that should be
    /// pushed to the [`crate::rtx::RtxQueue`] (every unacknowledged segment
    /// below `recovery_seqno`).
    pub fn on_out_of_order_ack(
        &mut self,
        cumulative_ack: u64,
        highest_sent: u64,
        cwnd: u64,
        maxwnd: u64,
        avg_pkt_size: u64,
        rtx_queue_empty: bool,
    ) -> Option<Range<u64>> {
        self.out_of_order_count = self.out_of_order_count.saturating_add(1);

        let threshold = Self::threshold(cwnd, maxwnd, avg_pkt_size);
        if self.loss_recovery_mode || !rtx_queue_empty || (self.out_of_order_count as u64) < threshold
        {
            return None;
        }

        self.loss_recovery_mode = true;
        self.recovery_seqno = highest_sent;
        Some(cumulative_ack..highest_sent)
    }

    /// Checks whether recovery should exit: `cumulative_ack >=
    /// recovery_seqno` (I7, P7).
    pub fn maybe_exit_recovery(&mut self, cumulative_ack: u64) -> bool {
        if self.loss_recovery_mode && cumulative_ack >= self.recovery_seqno {
            self.loss_recovery_mode = false;
            self.out_of_order_count = 0;
            return true;
        }
        false
    }

    /// Whether a quiet interval of `base_rtt + target_Qdelay` has elapsed
    /// with data outstanding, meaning a probe should be scheduled.
    pub fn should_probe(
        &self,
        now: Timestamp,
        base_rtt: PicoDuration,
        in_flight: u64,
        params: &Params,
    ) -> bool {
        if in_flight == 0 {
            return false;
        }
        let quiet_interval = base_rtt + params.target_qdelay;
        match self.last_probe_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= quiet_interval,
        }
    }

    #[inline]
    pub fn record_probe_sent(&mut self, now: Timestamp) {
        self.last_probe_time = Some(now);
    }

    /// Interprets a probe's response: if the pipe has drained
    /// (`raw_delay < target_Qdelay`), any still-missing packets behind the
    /// probe are deemed lost and returned for retransmission.
    pub fn on_probe_ack(
        &self,
        raw_delay: PicoDuration,
        params: &Params,
        cumulative_ack: u64,
        highest_sent: u64,
    ) -> Option<Range<u64>> {
        if raw_delay < params.target_qdelay && cumulative_ack < highest_sent {
            Some(cumulative_ack..highest_sent)
        } else {
            None
        }
    }
}

impl Default for Sleek {
    fn default() -> Self {
        Self::new()
    }
}
