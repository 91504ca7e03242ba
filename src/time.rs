// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Picosecond-resolution time types.
//!
//! The fabric this core targets runs at link speeds where a nanosecond is
//! already a coarse unit (100 Gbps moves roughly 12.5 bytes per nanosecond),
//! so `base_rtt` and every duration derived from it are tracked in
//! picoseconds rather than `core::time::Duration`'s nanosecond grain.

use core::{fmt, ops};

/// A span of time in picoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PicoDuration(u64);

impl PicoDuration {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_picos(picos: u64) -> Self {
        Self(picos)
    }

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos.saturating_mul(1_000))
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000_000))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000_000))
    }

    #[inline]
    pub const fn as_picos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000_000.0
    }

    /// Scales this duration by a dimensionless ratio, saturating on overflow.
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        debug_assert!(factor.is_finite() && factor >= 0.0);
        Self((self.0 as f64 * factor).round().max(0.0) as u64)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Add for PicoDuration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl ops::Mul<u64> for PicoDuration {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: u64) -> Self {
        Self(self.0.saturating_mul(rhs))
    }
}

impl fmt::Display for PicoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ps", self.0)
    }
}

/// An absolute point in time, monotonic within a single flow.
///
/// As with `s2n-quic-core`'s `Timestamp`, the absolute value is opaque and
/// only meaningful relative to other `Timestamp`s sourced from the same
/// [`Clock`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    #[inline]
    pub const fn from_epoch(picos: u64) -> Self {
        Self(picos)
    }

    #[inline]
    pub fn checked_add(self, duration: PicoDuration) -> Option<Self> {
        self.0.checked_add(duration.0).map(Self)
    }

    #[inline]
    pub fn saturating_add(self, duration: PicoDuration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }

    /// Duration elapsed since `earlier`.
    ///
    /// Panics (in debug builds) if `earlier` is after `self`; callers on the
    /// hot ACK path are expected to only ever subtract an earlier timestamp
    /// from a later one, per the event ordering guarantee in the
    /// concurrency model.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> PicoDuration {
        debug_assert!(self >= earlier, "timestamps must be monotonically ordered");
        PicoDuration(self.0.saturating_sub(earlier.0))
    }
}

impl ops::Sub for Timestamp {
    type Output = PicoDuration;

    #[inline]
    fn sub(self, rhs: Self) -> PicoDuration {
        self.saturating_duration_since(rhs)
    }
}

/// A source of [`Timestamp`]s, consumed from the host/NIC interface (§6).
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// A `Clock` that always returns the same instant; useful for constructing
/// deterministic unit tests without wiring up a real scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    #[inline]
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[cfg(feature = "std")]
mod std_clock {
    use super::*;
    use once_cell::sync::Lazy;
    use std::time::Instant;

    /// Every `StdClock` measures against this single process-wide epoch
    /// rather than its own construction time, so `Timestamp`s handed to
    /// two different flows (each with its own `StdClock` instance) remain
    /// comparable -- the per-instance-epoch alternative would make a
    /// `Timestamp` only meaningful relative to the clock that produced it,
    /// which is stricter than this crate actually needs.
    static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

    /// A `Clock` backed by `std::time::Instant`, converting its nanosecond
    /// grain up to picoseconds.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct StdClock;

    impl Clock for StdClock {
        #[inline]
        fn now(&self) -> Timestamp {
            Timestamp::from_epoch(EPOCH.elapsed().as_nanos() as u64 * 1_000)
        }
    }
}

#[cfg(feature = "std")]
pub use std_clock::StdClock;
