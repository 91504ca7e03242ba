// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! NSCC: a per-flow, sender-side congestion control core for a multi-path
//! datacenter fabric with ECN and packet-trimming support.
//!
//! This crate implements the algorithm only -- the Scaling Oracle, the
//! Delay Estimator, the Quadrant Classifier, the Window Controller, Quick
//! Adapt, and the SLEEK loss detector -- and leaves segment transmission,
//! timer scheduling, multipath routing policy, and wire encoding to a host
//! integration through the traits in [`host`] and [`multipath`]. See
//! [`flow::Flow`] for the single entry point a host drives per connection.
//!
//! ```text
//! on_ack/on_nack/on_probe_ack/on_timeout
//!   -> Delay Estimator (base_rtt, avg_delay)
//!   -> Quadrant Classifier (raw_delay vs target_Qdelay, ECN)
//!   -> Window Controller (inc_bytes / cwnd)
//!   -> Quick Adapt (emergency reset)
//!   -> SLEEK (reorder / loss)
//!   -> Publisher + MultipathEngine
//! ```

mod config;
mod delay;
mod error;
mod event;
mod flow;
mod host;
mod multipath;
mod oracle;
mod quadrant;
mod quick_adapt;
mod rtx;
mod sleek;
mod time;
mod window;

pub use config::{
    ConfigError, FeatureFlags, NetworkConfig, NetworkConfigBuilder, QaGate, ReferenceNetwork,
    TargetDelay, DEFAULT_MTU, MAX_MAXWND_MULTIPLIER, MIN_CWND_MTUS, MIN_MAXWND_MULTIPLIER,
};
pub use error::FatalError;
pub use event::{FulfillRecord, NoopPublisher, QaRecord, Quadrant, RecoveryRecord, TracingPublisher};
pub use flow::{Flow, FlowId, SeqInfo};
pub use host::{FixedHost, FixedTopology, Host, TimerHandle, TopologyOracle};
pub use multipath::{MultipathEngine, NoopMultipathEngine, PathFeedback, PathId};
pub use oracle::Params;
pub use quadrant::Action;
pub use rtx::RtxQueue;
pub use time::{Clock, FixedClock, PicoDuration, Timestamp};

#[cfg(feature = "std")]
pub use time::StdClock;
