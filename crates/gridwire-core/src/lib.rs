//! Gridwire Core -- wire-based power distribution for simulated worlds.
//!
//! Generators (wind turbines) push power through a network of devices
//! joined by wires. Every tick the network is rebuilt from the durable wire
//! list and the full power flow is recomputed, including transient
//! power-quality events (surges, brownouts, hard disconnects) that weaken
//! with every hop.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::PowerEngine::tick`] runs:
//!
//! 1. **Build** -- Resolve wires against live devices; report stale ones.
//! 2. **Synthesize** -- Choose each generator's event from weather.
//! 3. **Distribute** -- Walk each generator's output through the network.
//! 4. **Sync** -- Apply per-device results and broadcast updates.
//!
//! The host supplies its world through a [`engine::TickContext`]:
//!
//! ```rust,ignore
//! let mut ctx = TickContext {
//!     devices: &mut world,
//!     edges: &mut wires,
//!     weather: &mut weather,
//!     broadcaster: &mut updates,
//! };
//! let report = engine.tick(&mut ctx);
//! ```
//!
//! # Key Types
//!
//! - [`engine::PowerEngine`] -- Cross-tick state and the tick pipeline.
//! - [`graph::TickGraph`] -- Tick-local graph of terminals, wires and
//!   device clusters.
//! - [`flow::distribute`] -- Single-generator walk with per-branch cycle
//!   guard and clipping.
//! - [`event::PowerQualityEvent`] -- Surge/brownout/disconnect descriptor.
//! - [`wire::EdgeRepository`] -- Durable wire storage supplied by the host.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`serialize`] -- Versioned snapshots via bitcode.

pub mod config;
pub mod device;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod flow;
pub mod graph;
pub mod id;
pub mod notify;
pub mod rng;
pub mod serialize;
pub mod sync;
pub mod synth;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
