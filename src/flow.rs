// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Feedback Sink (§4.G) and the per-flow state that ties every other
//! component together.
//!
//! `Flow` is the single entry point a host integration drives: one
//! instance per connection, created at init and torn down at flow end
//! (§3). Its handler methods are meant to be called from a single thread
//! per flow (§5) -- nothing here is internally synchronized, by design.

use crate::{
    delay::DelayEstimator,
    error::FatalError,
    event::{FulfillRecord, Publisher, QaRecord, Quadrant, RecoveryRecord},
    multipath::{MultipathEngine, PathFeedback, PathId},
    oracle::Params,
    quadrant::{self, Action, FastIncreaseTracker},
    quick_adapt::QuickAdapt,
    rtx::RtxQueue,
    sleek::Sleek,
    time::{PicoDuration, Timestamp},
    window::WindowController,
};
use std::sync::Arc;

/// Sequence-number context carried on every ACK (§3, §4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeqInfo {
    /// The highest cumulatively-acknowledged sequence number after this
    /// ACK is applied.
    pub cumulative_ack: u64,
    /// Whether this ACK is the expected in-order successor of the
    /// previous cumulative ack. `false` drives SLEEK's out-of-order
    /// counter (§4.F).
    pub in_order: bool,
}

/// A flow identity, used to detect scheduler callbacks misrouted to the
/// wrong flow (§7, class 4).
pub type FlowId = u64;

/// Per-flow sender state (§3).
///
/// Constructed once per connection from a shared, read-only [`Params`]
/// bundle (§4.A, §5's Shared resources -- the bundle itself needs no
/// synchronization since every flow only ever reads it).
pub struct Flow {
    id: FlowId,
    params: Arc<Params>,

    delay: DelayEstimator,
    window: WindowController,
    fast_increase: FastIncreaseTracker,
    quick_adapt: QuickAdapt,
    sleek: Sleek,
    rtx: RtxQueue,

    highest_sent: u64,
    cumulative_ack: u64,
    bytes_in_flight: u64,

    terminal: bool,
}

impl Flow {
    /// Creates a new flow. `initial_base_rtt` is sourced from the topology
    /// oracle's `two_point_rtt` at setup (§6); `initial_cwnd` is typically
    /// one MTU, the same starting point `min_cwnd` names.
    pub fn new(
        id: FlowId,
        params: Arc<Params>,
        initial_base_rtt: PicoDuration,
        now: Timestamp,
    ) -> Self {
        let initial_cwnd = params.min_cwnd();
        Self {
            id,
            delay: DelayEstimator::new(initial_base_rtt),
            window: WindowController::new(initial_cwnd, now),
            fast_increase: FastIncreaseTracker::new(),
            quick_adapt: QuickAdapt::new(now),
            sleek: Sleek::new(),
            rtx: RtxQueue::new(),
            highest_sent: 0,
            cumulative_ack: 0,
            bytes_in_flight: 0,
            terminal: false,
            params,
        }
    }

    #[inline]
    pub fn id(&self) -> FlowId {
        self.id
    }

    #[inline]
    pub fn cwnd(&self) -> u64 {
        self.window.cwnd()
    }

    #[inline]
    pub fn base_rtt(&self) -> PicoDuration {
        self.delay.base_rtt()
    }

    #[inline]
    pub fn avg_delay(&self) -> PicoDuration {
        self.delay.avg_delay()
    }

    #[inline]
    pub fn bdp(&self) -> u64 {
        self.params.bdp(self.delay.base_rtt())
    }

    #[inline]
    pub fn maxwnd(&self) -> u64 {
        self.params.maxwnd(self.delay.base_rtt())
    }

    #[inline]
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    #[inline]
    pub fn in_recovery(&self) -> bool {
        self.sleek.in_recovery()
    }

    #[inline]
    pub fn rtx_queue(&mut self) -> &mut RtxQueue {
        &mut self.rtx
    }

    /// Marks the flow terminal (§5, Cancellation). Every handler below
    /// rejects further events with [`FatalError::CallbackAfterTeardown`]
    /// once this has run; the host is responsible for also cancelling any
    /// outstanding timers for this flow by identity.
    pub fn teardown(&mut self) {
        self.terminal = true;
    }

    fn check_identity(&self, flow_id: FlowId) -> Result<(), FatalError> {
        if self.terminal {
            return Err(FatalError::CallbackAfterTeardown { flow_id: self.id });
        }
        if flow_id != self.id {
            return Err(FatalError::FlowIdentityMismatch {
                expected: self.id,
                actual: flow_id,
            });
        }
        Ok(())
    }

    /// Records that `bytes` were sent under sequence number `seqno`,
    /// advancing `highest_sent` and `bytes_in_flight`. Not part of the
    /// Feedback Sink proper (§4.G only names ACK/NACK/probe/timeout), but
    /// necessary bookkeeping: §4.E's `bytes_to_ignore <- in_flight` and
    /// §4.F's reorder threshold both need an up-to-date picture of what's
    /// outstanding, the same way `on_packet_sent` does in
    /// `s2n_quic_core::recovery::congestion_controller::CongestionController`.
    pub fn on_packet_sent(&mut self, flow_id: FlowId, bytes: u64, seqno: u64) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(bytes);
        self.highest_sent = self.highest_sent.max(seqno);
        Ok(())
    }

    /// The Feedback Sink's primary entry point (§4.G): `on_ack`.
    ///
    /// While the Quick Adapt stale-feedback mask is active, only the mask
    /// itself is consumed and sequence bookkeeping advances; `base_rtt`
    /// refinement (§4.B) and the SLEEK reorder check (§4.F) still run
    /// since neither is named as suppressed by §4.E ("suppresses 4.C-4.D
    /// entirely") -- but EWMA update, quadrant selection, window mutation,
    /// and QA re-accumulation are all skipped. See `DESIGN.md` for the
    /// resolution of this ambiguity between §4.E's prose and §4.G's
    /// pseudocode.
    #[allow(clippy::too_many_arguments)]
    pub fn on_ack(
        &mut self,
        flow_id: FlowId,
        now: Timestamp,
        raw_rtt: PicoDuration,
        ecn: bool,
        new_bytes_acked: u64,
        seq_info: SeqInfo,
        path_id: PathId,
        multipath: &mut dyn MultipathEngine,
        publisher: &mut dyn Publisher,
    ) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;

        let base_rtt_changed = self.delay.observe_rtt_sample(raw_rtt);
        if base_rtt_changed {
            self.window.clamp(self.delay.base_rtt(), &self.params)?;
        }
        let raw_delay = self.delay.raw_delay(raw_rtt);

        if self.quick_adapt.mask_active() {
            self.quick_adapt.consume_mask(new_bytes_acked);
            self.advance_sequence(seq_info, &mut *publisher);
            self.bytes_in_flight = self.bytes_in_flight.saturating_sub(new_bytes_acked);
            self.notify_multipath(&mut *multipath, path_id, ecn, false);
            return Ok(());
        }

        self.delay.update_ewma(ecn, raw_delay, &self.params);

        let cwnd_before_action = self.window.cwnd();
        let fast_active =
            self.fast_increase
                .on_ack(raw_delay, new_bytes_acked, cwnd_before_action);
        let action = if fast_active {
            Action::FastIncrease
        } else {
            quadrant::classify(ecn, raw_delay, self.params.target_qdelay)
        };

        let base_rtt = self.delay.base_rtt();
        match action {
            Action::FairIncrease => self.window.fair_increase(new_bytes_acked, &self.params),
            Action::ProportionalIncrease => {
                self.window
                    .proportional_increase(new_bytes_acked, raw_delay, &self.params)
            }
            Action::FastIncrease => {
                self.window
                    .fast_increase(new_bytes_acked, base_rtt, &self.params)?
            }
            Action::Noop => self.window.noop(),
            Action::MultiplicativeDecrease => {
                self.window.multiplicative_decrease(
                    self.delay.avg_delay(),
                    now,
                    base_rtt,
                    &self.params,
                )?;
            }
        }

        self.window.record_received(new_bytes_acked);
        self.quick_adapt.record_achieved(new_bytes_acked);

        if self.window.maybe_fulfill(now, base_rtt, &self.params)? {
            publisher.on_fulfill(FulfillRecord {
                time: now,
                flow_id: self.id,
                cwnd: self.window.cwnd(),
                in_flight: self.bytes_in_flight,
                bdp: self.params.bdp(base_rtt),
                maxwnd: self.params.maxwnd(base_rtt),
                avg_delay: self.delay.avg_delay(),
                raw_delay,
                target_qdelay: self.params.target_qdelay,
                base_rtt,
                ecn,
                quadrant: Quadrant::from(action),
                inc_bytes_applied: self.window.inc_bytes(),
            });
        }

        self.maybe_fire_quick_adapt(now, base_rtt, Some(raw_delay), &mut *publisher)?;

        self.advance_sequence(seq_info, &mut *publisher);
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(new_bytes_acked);
        self.notify_multipath(&mut *multipath, path_id, ecn, false);

        Ok(())
    }

    /// `on_nack` (§4.G): optionally feeds the Delay Estimator, sets the QA
    /// trigger, increments the SLEEK counter, and notifies the multipath
    /// engine with `PATH_NACK`.
    pub fn on_nack(
        &mut self,
        flow_id: FlowId,
        raw_rtt: Option<PicoDuration>,
        seq_info: SeqInfo,
        path_id: PathId,
        multipath: &mut dyn MultipathEngine,
        publisher: &mut dyn Publisher,
    ) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;

        if self.params.nack_refines_base_rtt {
            if let Some(raw_rtt) = raw_rtt {
                let changed = self.delay.observe_rtt_sample(raw_rtt);
                if changed {
                    self.window.clamp(self.delay.base_rtt(), &self.params)?;
                }
            }
        }

        self.quick_adapt.set_trigger();
        self.advance_sequence(seq_info, publisher);
        self.notify_multipath(multipath, path_id, false, true);
        Ok(())
    }

    /// `on_probe_ack` (§4.G): interprets a SLEEK probe response and, if the
    /// pipe has drained, enqueues the newly-confirmed-lost range.
    pub fn on_probe_ack(
        &mut self,
        flow_id: FlowId,
        raw_rtt: PicoDuration,
    ) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;
        let raw_delay = self.delay.raw_delay(raw_rtt);
        if let Some(range) =
            self.sleek
                .on_probe_ack(raw_delay, &self.params, self.cumulative_ack, self.highest_sent)
        {
            self.rtx.push(range);
        }
        Ok(())
    }

    /// `on_timeout` (§4.G): notifies the multipath engine with
    /// `PATH_TIMEOUT` and sets the QA trigger.
    pub fn on_timeout(
        &mut self,
        flow_id: FlowId,
        path_id: PathId,
        multipath: &mut dyn MultipathEngine,
    ) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;
        self.quick_adapt.set_trigger();
        multipath.notify(path_id, PathFeedback::Timeout);
        Ok(())
    }

    /// Drives time-based transitions that don't wait on an ACK: the
    /// fulfill-adjustment period trigger, the Quick Adapt evaluation
    /// interval, and SLEEK's probe schedule (§5, Timeouts). A host
    /// integration calls this when a previously scheduled deadline fires.
    pub fn on_timer(
        &mut self,
        flow_id: FlowId,
        now: Timestamp,
        publisher: &mut dyn Publisher,
    ) -> Result<(), FatalError> {
        self.check_identity(flow_id)?;
        let base_rtt = self.delay.base_rtt();

        if self.window.maybe_fulfill(now, base_rtt, &self.params)? {
            publisher.on_fulfill(FulfillRecord {
                time: now,
                flow_id: self.id,
                cwnd: self.window.cwnd(),
                in_flight: self.bytes_in_flight,
                bdp: self.params.bdp(base_rtt),
                maxwnd: self.params.maxwnd(base_rtt),
                avg_delay: self.delay.avg_delay(),
                raw_delay: PicoDuration::ZERO,
                target_qdelay: self.params.target_qdelay,
                base_rtt,
                ecn: false,
                quadrant: Quadrant::Noop,
                inc_bytes_applied: self.window.inc_bytes(),
            });
        }

        self.maybe_fire_quick_adapt(now, base_rtt, None, publisher)?;

        if self
            .sleek
            .should_probe(now, base_rtt, self.bytes_in_flight, &self.params)
        {
            self.sleek.record_probe_sent(now);
        }

        Ok(())
    }

    fn maybe_fire_quick_adapt(
        &mut self,
        now: Timestamp,
        base_rtt: PicoDuration,
        raw_delay: Option<PicoDuration>,
        publisher: &mut dyn Publisher,
    ) -> Result<(), FatalError> {
        let maxwnd = self.params.maxwnd(base_rtt);
        let cwnd_before = self.window.cwnd();
        if let Some(fired) = self.quick_adapt.maybe_fire(
            now,
            base_rtt,
            maxwnd,
            self.bytes_in_flight,
            raw_delay,
            &self.params,
        ) {
            self.window.set_cwnd(fired.new_cwnd);
            self.window.clamp(base_rtt, &self.params)?;
            publisher.on_quick_adapt(QaRecord {
                time: now,
                flow_id: self.id,
                cwnd_before,
                cwnd_after: self.window.cwnd(),
                bytes_to_ignore: fired.bytes_to_ignore,
            });
        }
        Ok(())
    }

    fn advance_sequence(&mut self, seq_info: SeqInfo, publisher: &mut dyn Publisher) {
        if !seq_info.in_order {
            let avg_pkt_size = self.params.mtu as u64;
            if let Some(range) = self.sleek.on_out_of_order_ack(
                self.cumulative_ack,
                self.highest_sent,
                self.window.cwnd(),
                self.params.maxwnd(self.delay.base_rtt()),
                avg_pkt_size,
                self.rtx.is_empty(),
            ) {
                self.rtx.push(range);
                publisher.on_recovery_transition(RecoveryRecord {
                    flow_id: self.id,
                    entered: true,
                    recovery_seqno: self.sleek.recovery_seqno(),
                });
            }
        }

        self.cumulative_ack = self.cumulative_ack.max(seq_info.cumulative_ack);

        if self.sleek.maybe_exit_recovery(self.cumulative_ack) {
            publisher.on_recovery_transition(RecoveryRecord {
                flow_id: self.id,
                entered: false,
                recovery_seqno: self.sleek.recovery_seqno(),
            });
        }
    }

    fn notify_multipath(
        &self,
        multipath: &mut dyn MultipathEngine,
        path_id: PathId,
        ecn: bool,
        is_nack: bool,
    ) {
        let feedback = if is_nack {
            PathFeedback::Nack
        } else if ecn {
            PathFeedback::Ecn
        } else {
            PathFeedback::Good
        };
        multipath.notify(path_id, feedback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::NetworkConfig,
        event::NoopPublisher,
        multipath::NoopMultipathEngine,
    };

    fn flow_with(base_rtt: PicoDuration, multiplier: f64) -> Flow {
        let config = NetworkConfig::builder(100_000_000_000, PicoDuration::from_micros(12))
            .mtu(4096)
            .maxwnd_multiplier(multiplier)
            .build()
            .unwrap();
        let params = Arc::new(Params::derive(&config));
        Flow::new(1, params, base_rtt, Timestamp::from_epoch(0))
    }

    #[test]
    fn invariant_p1_cwnd_always_within_bounds() {
        let mut flow = flow_with(PicoDuration::from_micros(12), 1.5);
        let mut mp = NoopMultipathEngine;
        let mut pub_ = NoopPublisher;

        for i in 0..500u64 {
            flow.on_ack(
                1,
                Timestamp::from_epoch(1_000_000 * (i + 1)),
                PicoDuration::from_micros(12),
                i % 7 == 0,
                4096,
                SeqInfo {
                    cumulative_ack: i * 4096,
                    in_order: true,
                },
                0,
                &mut mp,
                &mut pub_,
            )
            .unwrap();
            assert!(flow.cwnd() >= flow.params.min_cwnd());
            assert!(flow.cwnd() <= flow.maxwnd());
        }
    }

    #[test]
    fn scenario_s1_two_flows_converge_near_bdp_and_each_other() {
        let mut a = flow_with(PicoDuration::from_micros(12), 1.5);
        let mut b = flow_with(PicoDuration::from_micros(12), 1.5);
        let mut mp = NoopMultipathEngine;
        let mut pub_ = NoopPublisher;

        let base_rtt = PicoDuration::from_micros(12);
        let mut t = Timestamp::from_epoch(1);
        for round in 0..200u64 {
            for flow in [&mut a, &mut b] {
                t = t.saturating_add(base_rtt);
                flow.on_ack(
                    1,
                    t,
                    base_rtt,
                    false,
                    4096,
                    SeqInfo {
                        cumulative_ack: round * 4096,
                        in_order: true,
                    },
                    0,
                    &mut mp,
                    &mut pub_,
                )
                .unwrap();
            }
        }

        let bdp = a.bdp() as f64;
        assert!((a.cwnd() as f64 - bdp).abs() / bdp < 0.10);
        assert!((a.cwnd() as f64 - b.cwnd() as f64).abs() / bdp < 0.10);
    }

    #[test]
    fn scenario_s3_noop_quadrant_leaves_cwnd_unchanged_and_notifies_ecn() {
        let mut flow = flow_with(PicoDuration::from_micros(12), 1.5);
        let mut mp = NoopMultipathEngine;
        let mut pub_ = NoopPublisher;
        flow.window = WindowController::new(100_000, Timestamp::from_epoch(0));

        let before = flow.cwnd();
        flow.on_ack(
            1,
            Timestamp::from_epoch(1),
            PicoDuration::from_micros(12) + PicoDuration::from_micros(2),
            true,
            4096,
            SeqInfo {
                cumulative_ack: 4096,
                in_order: true,
            },
            0,
            &mut mp,
            &mut pub_,
        )
        .unwrap();
        assert_eq!(flow.cwnd(), before);
    }

    #[test]
    fn teardown_rejects_further_events() {
        let mut flow = flow_with(PicoDuration::from_micros(12), 1.5);
        flow.teardown();
        let mut mp = NoopMultipathEngine;
        let mut pub_ = NoopPublisher;
        let err = flow
            .on_ack(
                1,
                Timestamp::from_epoch(1),
                PicoDuration::from_micros(12),
                false,
                4096,
                SeqInfo {
                    cumulative_ack: 4096,
                    in_order: true,
                },
                0,
                &mut mp,
                &mut pub_,
            )
            .unwrap_err();
        assert!(matches!(err, FatalError::CallbackAfterTeardown { .. }));
    }

    #[test]
    fn flow_identity_mismatch_is_fatal() {
        let mut flow = flow_with(PicoDuration::from_micros(12), 1.5);
        let mut mp = NoopMultipathEngine;
        let mut pub_ = NoopPublisher;
        let err = flow
            .on_ack(
                999,
                Timestamp::from_epoch(1),
                PicoDuration::from_micros(12),
                false,
                4096,
                SeqInfo {
                    cumulative_ack: 4096,
                    in_order: true,
                },
                0,
                &mut mp,
                &mut pub_,
            )
            .unwrap_err();
        assert!(matches!(err, FatalError::FlowIdentityMismatch { .. }));
    }
}
