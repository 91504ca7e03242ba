// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The configuration surface a host integration fills in once, at process
//! init or per-flow setup, before the Scaling Oracle (§4.A) can derive its
//! parameter bundle.

use crate::time::PicoDuration;
use thiserror::Error;

/// MTU in bytes. The reference network in §4.A is defined in terms of this
/// value; 4096 matches the fabric this core was designed for.
pub const DEFAULT_MTU: u32 = 4096;

/// `min_cwnd` is always exactly one MTU (§3).
pub const MIN_CWND_MTUS: u32 = 1;

/// Bounds on the `maxwnd = multiplier * bdp` relationship (§3).
pub const MIN_MAXWND_MULTIPLIER: f64 = 1.25;
pub const MAX_MAXWND_MULTIPLIER: f64 = 1.5;

/// Reference network used to compute the dimensionless scale factors `a`
/// and `b` in §4.A. Only the ratio of these constants to the actual network
/// matters; the absolute values are otherwise arbitrary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceNetwork {
    pub linkspeed_bps: u64,
    pub rtt: PicoDuration,
}

impl Default for ReferenceNetwork {
    /// ~100 Gbps / 12 microseconds, the reference network named in §4.A's
    /// rationale.
    fn default() -> Self {
        Self {
            linkspeed_bps: 100_000_000_000,
            rtt: PicoDuration::from_micros(12),
        }
    }
}

/// Explicit override for `target_Qdelay`, or a derivation rule (§4.A).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum TargetDelay {
    /// Use the priority-order default: `0.75 * network_rtt` if trimming is
    /// enabled, `network_rtt` otherwise.
    #[default]
    Auto,
    /// Use this value regardless of the trimming flag.
    Override(PicoDuration),
}

/// Feature flags with a documented default and a known-risky corner case
/// (§9, Open Question (i)).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureFlags {
    /// Whether the fabric trims packets at congested switches instead of
    /// queuing them (affects `target_Qdelay` selection and NACK semantics).
    pub trimming_enabled: bool,
    /// Whether NACK-carried RTT samples are allowed to refine `base_rtt`.
    /// Default on. Trimmed packets can carry unusual forwarding delays, so
    /// a NACK-derived sample can lock in an artificially low `base_rtt`;
    /// this flag exists so an integrator can turn the behavior off without
    /// forking the estimator.
    pub nack_refines_base_rtt: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            trimming_enabled: false,
            nack_refines_base_rtt: true,
        }
    }
}

/// The Quick Adapt underperformance gate, `qa_gate` in §4.E: the
/// underperformance threshold is `maxwnd >> qa_gate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QaGate(u8);

impl QaGate {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 4;
    pub const DEFAULT: u8 = 3;

    pub fn new(shift: u8) -> Result<Self, ConfigError> {
        if shift > Self::MAX {
            return Err(ConfigError::QaGateOutOfRange { shift });
        }
        Ok(Self(shift))
    }

    #[inline]
    pub fn shift(self) -> u32 {
        self.0 as u32
    }
}

impl Default for QaGate {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Per-flow network parameters supplied by the host at connection init
/// (§4.A, §6's topology oracle).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkConfig {
    pub linkspeed_bps: u64,
    pub mtu: u32,
    /// `network_rtt`: the flow's actual round-trip time, typically sourced
    /// from the topology oracle's `two_point_rtt` at setup.
    pub network_rtt: PicoDuration,
    pub reference: ReferenceNetwork,
    pub target_delay: TargetDelay,
    pub maxwnd_multiplier: f64,
    pub flags: FeatureFlags,
    pub qa_gate: QaGate,
}

impl NetworkConfig {
    pub fn builder(linkspeed_bps: u64, network_rtt: PicoDuration) -> NetworkConfigBuilder {
        NetworkConfigBuilder {
            linkspeed_bps,
            network_rtt,
            mtu: DEFAULT_MTU,
            reference: ReferenceNetwork::default(),
            target_delay: TargetDelay::default(),
            maxwnd_multiplier: MIN_MAXWND_MULTIPLIER,
            flags: FeatureFlags::default(),
            qa_gate: QaGate::default(),
        }
    }

    /// `target_Qdelay` per the priority order in §4.A.
    pub fn target_qdelay(&self) -> PicoDuration {
        match self.target_delay {
            TargetDelay::Override(d) => d,
            TargetDelay::Auto if self.flags.trimming_enabled => {
                self.network_rtt.scale(0.75)
            }
            TargetDelay::Auto => self.network_rtt,
        }
    }
}

#[derive(Debug, Default)]
pub struct NetworkConfigBuilder {
    linkspeed_bps: u64,
    network_rtt: PicoDuration,
    mtu: u32,
    reference: ReferenceNetwork,
    target_delay: TargetDelay,
    maxwnd_multiplier: f64,
    flags: FeatureFlags,
    qa_gate: QaGate,
}

impl NetworkConfigBuilder {
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn reference(mut self, reference: ReferenceNetwork) -> Self {
        self.reference = reference;
        self
    }

    pub fn target_delay(mut self, target_delay: TargetDelay) -> Self {
        self.target_delay = target_delay;
        self
    }

    pub fn maxwnd_multiplier(mut self, multiplier: f64) -> Self {
        self.maxwnd_multiplier = multiplier;
        self
    }

    pub fn flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn qa_gate(mut self, qa_gate: QaGate) -> Self {
        self.qa_gate = qa_gate;
        self
    }

    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        if self.linkspeed_bps == 0 {
            return Err(ConfigError::ZeroLinkspeed);
        }
        if self.network_rtt == PicoDuration::ZERO {
            return Err(ConfigError::ZeroNetworkRtt);
        }
        if self.mtu == 0 {
            return Err(ConfigError::ZeroMtu);
        }
        if self.reference.linkspeed_bps == 0 || self.reference.rtt == PicoDuration::ZERO {
            return Err(ConfigError::InvalidReferenceNetwork);
        }
        if !(MIN_MAXWND_MULTIPLIER..=MAX_MAXWND_MULTIPLIER).contains(&self.maxwnd_multiplier) {
            return Err(ConfigError::MaxwndMultiplierOutOfRange {
                multiplier: self.maxwnd_multiplier,
            });
        }
        if let TargetDelay::Override(d) = self.target_delay {
            if d == PicoDuration::ZERO {
                return Err(ConfigError::ZeroTargetDelay);
            }
        }

        Ok(NetworkConfig {
            linkspeed_bps: self.linkspeed_bps,
            mtu: self.mtu,
            network_rtt: self.network_rtt,
            reference: self.reference,
            target_delay: self.target_delay,
            maxwnd_multiplier: self.maxwnd_multiplier,
            flags: self.flags,
            qa_gate: self.qa_gate,
        })
    }
}

/// Construction-time validation failures (§4.I). These are reported, never
/// silently clamped or saturated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("linkspeed must be non-zero")]
    ZeroLinkspeed,
    #[error("network_rtt must be non-zero")]
    ZeroNetworkRtt,
    #[error("mtu must be non-zero")]
    ZeroMtu,
    #[error("reference network must have non-zero linkspeed and rtt")]
    InvalidReferenceNetwork,
    #[error("target_Qdelay override must be non-zero")]
    ZeroTargetDelay,
    #[error(
        "maxwnd multiplier {multiplier} outside of [{min}, {max}]",
        min = MIN_MAXWND_MULTIPLIER,
        max = MAX_MAXWND_MULTIPLIER
    )]
    MaxwndMultiplierOutOfRange { multiplier: f64 },
    #[error("qa_gate shift {shift} exceeds maximum of {max}", max = QaGate::MAX)]
    QaGateOutOfRange { shift: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_linkspeed() {
        let err = NetworkConfig::builder(0, PicoDuration::from_micros(12))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroLinkspeed);
    }

    #[test]
    fn target_delay_auto_respects_trimming_flag() {
        let cfg = NetworkConfig::builder(100_000_000_000, PicoDuration::from_micros(12))
            .flags(FeatureFlags {
                trimming_enabled: true,
                nack_refines_base_rtt: true,
            })
            .build()
            .unwrap();
        assert_eq!(cfg.target_qdelay(), PicoDuration::from_micros(9));
    }

    #[test]
    fn target_delay_auto_without_trimming_is_network_rtt() {
        let cfg = NetworkConfig::builder(100_000_000_000, PicoDuration::from_micros(12))
            .build()
            .unwrap();
        assert_eq!(cfg.target_qdelay(), PicoDuration::from_micros(12));
    }
}
