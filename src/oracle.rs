// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Scaling Oracle (§4.A).
//!
//! Two dimensionless ratios -- a bdp-scale `a` and a delay-scale `b` --
//! encode the entire network into the parameter bundle below. The
//! reference network is otherwise arbitrary; only the ratios matter. With
//! `b = target_Qdelay / ref_rtt`, the product `a * b / target_Qdelay` is
//! independent of the target, so the *shape* of the proportional response
//! is invariant across network sizes -- only the equilibrium point shifts.
//!
//! The bundle computed here is written once, at process init, and is
//! thereafter read-only for every flow that shares it (§5, Shared
//! resources): no synchronization is required to hand out `&Params`.

use crate::{config::NetworkConfig, time::PicoDuration};
use num_rational::Ratio;
use num_traits::ToPrimitive;

/// `eta`'s coefficient in §4.A (`eta = 0.15 * MSS * a`).
const ETA_COEFFICIENT: f64 = 0.15;
/// `fi`'s coefficient (`fi = 5 * MSS * a`).
const FI_COEFFICIENT: f64 = 5.0;
/// `alpha`'s coefficient (`alpha = 4 * MSS * a * b / target_Qdelay`).
const ALPHA_COEFFICIENT: f64 = 4.0;
/// `fi_scale`'s coefficient (`fi_scale = 0.25 * a`).
const FI_SCALE_COEFFICIENT: f64 = 0.25;
/// Decrease aggressiveness, dimensionless (§4.D), held as an exact
/// rational the same way `s2n_quic_core::recovery::bbr::data_volume` keeps
/// its own dimensionless ECN alpha as a `Ratio<u64>` rather than an `f64`
/// literal -- `4/5` is exact where `0.8` is already a repeating binary
/// fraction.
fn gamma_ratio() -> Ratio<u64> {
    Ratio::new(4, 5)
}
/// EWMA weight for the slow delay filter (§4.B), `1/80` exactly.
fn delay_alpha_ratio() -> Ratio<u64> {
    Ratio::new(1, 80)
}
/// `qa_threshold = 4 * target_Qdelay` (§4.A).
const QA_THRESHOLD_MULTIPLE: u64 = 4;
/// `adjust_bytes_threshold = 8 * MTU` (§4.A).
const ADJUST_BYTES_THRESHOLD_MTUS: u32 = 8;
/// Floor on a single multiplicative decrease (§4.D).
pub const DECREASE_FLOOR: f64 = 0.5;

/// The read-only parameter bundle a flow is constructed with.
///
/// All fields are named after the symbols used in §4.A so the
/// implementation of §4.D/§4.E can be read side by side with the design
/// notes those sections describe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    pub mtu: u32,
    pub linkspeed_bps: u64,
    pub maxwnd_multiplier: f64,

    /// Proportional-increase gain.
    pub alpha: f64,
    /// Fair-increase constant, in bytes per acked byte.
    pub fi: f64,
    /// Per-fulfill additive nudge, in bytes.
    pub eta: f64,
    /// Fast-increase multiplier, dimensionless.
    pub fi_scale: f64,
    /// Decrease aggressiveness.
    pub gamma: f64,
    /// EWMA weight for `avg_delay`.
    pub delay_alpha: f64,

    pub target_qdelay: PicoDuration,
    pub qa_threshold: PicoDuration,
    pub adjust_bytes_threshold: u32,
    pub adjust_period_threshold: PicoDuration,

    pub qa_gate_shift: u32,
    pub nack_refines_base_rtt: bool,
}

impl Params {
    /// Derives the parameter bundle from the reference network and the
    /// actual network constants, per §4.A.
    pub fn derive(config: &NetworkConfig) -> Self {
        let ref_bdp = bdp_bytes(config.reference.linkspeed_bps, config.reference.rtt);
        let actual_bdp = bdp_bytes(config.linkspeed_bps, config.network_rtt);
        let target_qdelay = config.target_qdelay();

        // scaling_factor_a = actual_bdp / ref_bdp
        let a = actual_bdp as f64 / ref_bdp as f64;
        // scaling_factor_b = target_Qdelay / ref_rtt
        let b = target_qdelay.as_secs_f64() / config.reference.rtt.as_secs_f64();

        let mss = config.mtu as f64;

        let alpha = ALPHA_COEFFICIENT * mss * a * b / target_qdelay.as_secs_f64();
        let fi = FI_COEFFICIENT * mss * a;
        let eta = ETA_COEFFICIENT * mss * a;
        let fi_scale = FI_SCALE_COEFFICIENT * a;

        let qa_threshold = target_qdelay.scale(QA_THRESHOLD_MULTIPLE as f64);
        let adjust_bytes_threshold = ADJUST_BYTES_THRESHOLD_MTUS * config.mtu;
        let adjust_period_threshold = config.network_rtt;

        Self {
            mtu: config.mtu,
            linkspeed_bps: config.linkspeed_bps,
            maxwnd_multiplier: config.maxwnd_multiplier,
            alpha,
            fi,
            eta,
            fi_scale,
            gamma: gamma_ratio().to_f64().unwrap_or(0.8),
            delay_alpha: delay_alpha_ratio().to_f64().unwrap_or(1.0 / 80.0),
            target_qdelay,
            qa_threshold,
            adjust_bytes_threshold,
            adjust_period_threshold,
            qa_gate_shift: config.qa_gate.shift(),
            nack_refines_base_rtt: config.flags.nack_refines_base_rtt,
        }
    }

    /// `min_cwnd`: always exactly one MTU (§3).
    #[inline]
    pub fn min_cwnd(&self) -> u64 {
        self.mtu as u64
    }

    /// `bdp = round(base_rtt * linkspeed / 8)` (I3).
    #[inline]
    pub fn bdp(&self, base_rtt: PicoDuration) -> u64 {
        bdp_bytes(self.linkspeed_bps, base_rtt)
    }

    /// `maxwnd = multiplier * bdp` (I3).
    #[inline]
    pub fn maxwnd(&self, base_rtt: PicoDuration) -> u64 {
        let bdp = self.bdp(base_rtt) as f64;
        (bdp * self.maxwnd_multiplier).round() as u64
    }
}

/// `linkspeed * rtt / 8`, rounded to the nearest byte.
#[inline]
fn bdp_bytes(linkspeed_bps: u64, rtt: PicoDuration) -> u64 {
    // linkspeed is bits/sec, rtt is in picoseconds: bits = linkspeed * rtt_ps / 1e12
    let bits = linkspeed_bps as f64 * rtt.as_secs_f64();
    (bits / 8.0).round() as u64
}
