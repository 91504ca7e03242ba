// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Delay Estimator (§4.B).
//!
//! This is the one place `base_rtt` is allowed to move, and it only ever
//! shrinks (I2). Everything downstream -- `bdp`, `maxwnd`, the quadrant
//! classifier's target comparison, the decrease magnitude -- is derived
//! from the value this module holds, so the 4.C/4.D split described in §9
//! starts here: `raw_delay` feeds the classifier, `avg_delay` feeds the
//! decrease magnitude, and the two are allowed to disagree by design.

use crate::{error::FatalError, oracle::Params, time::PicoDuration};

/// Tracks base RTT and the dual-timescale delay filter for one flow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayEstimator {
    base_rtt: PicoDuration,
    avg_delay: PicoDuration,
}

/// The three-case rule a single ACK sample is fed through (§4.B).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EwmaCase {
    /// No ECN and `raw_delay > target`: likely a single hot path. The
    /// sample is discounted so one congested path among many sprayed
    /// paths doesn't inflate the average that governs decrease magnitude.
    DiscountedHotPath,
    /// `raw_delay > 5 * base_rtt`, overriding the hot-path discount: an
    /// extreme sample is trusted outright even without ECN.
    Extreme,
    /// Neither of the above: the normal case.
    Normal,
}

impl DelayEstimator {
    #[inline]
    pub fn new(initial_base_rtt: PicoDuration) -> Self {
        Self {
            base_rtt: initial_base_rtt,
            // avg_delay starts at zero: an empty network has no queuing
            // delay to report until the first sample arrives.
            avg_delay: PicoDuration::ZERO,
        }
    }

    #[inline]
    pub fn base_rtt(&self) -> PicoDuration {
        self.base_rtt
    }

    #[inline]
    pub fn avg_delay(&self) -> PicoDuration {
        self.avg_delay
    }

    /// Refines `base_rtt` against a freshly observed `raw_rtt`, per I2:
    /// `base_rtt` only ever shrinks. Returns `true` if `base_rtt` (and
    /// therefore `bdp`/`maxwnd`) changed, so the caller knows to re-clamp
    /// `cwnd` against the new ceiling (§4.B, S6).
    #[inline]
    pub fn observe_rtt_sample(&mut self, raw_rtt: PicoDuration) -> bool {
        if raw_rtt < self.base_rtt {
            self.base_rtt = raw_rtt;
            true
        } else {
            false
        }
    }

    /// Attempts to force `base_rtt` upward; always a caller bug (I2).
    pub fn attempt_base_rtt_increase(
        &mut self,
        attempted: PicoDuration,
    ) -> Result<(), FatalError> {
        if attempted > self.base_rtt {
            return Err(FatalError::BaseRttIncreaseAttempted {
                current: self.base_rtt.as_picos(),
                attempted: attempted.as_picos(),
            });
        }
        Ok(())
    }

    /// `raw_delay = max(raw_rtt - base_rtt, 0)`.
    #[inline]
    pub fn raw_delay(&self, raw_rtt: PicoDuration) -> PicoDuration {
        raw_rtt.saturating_sub(self.base_rtt)
    }

    /// Updates the slow EWMA `avg_delay` from one ACK sample, applying the
    /// C1/C2/C3 trust rule.
    pub fn update_ewma(&mut self, ecn: bool, raw_delay: PicoDuration, params: &Params) {
        let case = self.classify_sample(ecn, raw_delay, params.target_qdelay);
        let sample = match case {
            EwmaCase::DiscountedHotPath => self.base_rtt.scale(0.25),
            EwmaCase::Extreme | EwmaCase::Normal => raw_delay,
        };
        self.feed_ewma(sample, params.delay_alpha);
    }

    fn classify_sample(
        &self,
        ecn: bool,
        raw_delay: PicoDuration,
        target_qdelay: PicoDuration,
    ) -> EwmaCase {
        // C2 overrides C1: an extreme sample is trusted regardless of ECN.
        if raw_delay > self.base_rtt * 5 {
            return EwmaCase::Extreme;
        }
        if !ecn && raw_delay > target_qdelay {
            return EwmaCase::DiscountedHotPath;
        }
        EwmaCase::Normal
    }

    #[inline]
    fn feed_ewma(&mut self, sample: PicoDuration, weight: f64) {
        debug_assert!((0.0..=1.0).contains(&weight));
        let prev = self.avg_delay.as_picos() as f64;
        let sample = sample.as_picos() as f64;
        let next = prev + weight * (sample - prev);
        self.avg_delay = PicoDuration::from_picos(next.max(0.0).round() as u64);
    }
}
