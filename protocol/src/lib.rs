// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Holdfast Protocol Host Collaborators
//!
//! The escrow engine in `holdfast-contracts` is deliberately ignorant of
//! the ledger it runs on. Everything it needs from the outside world is
//! defined here as a narrow seam plus a reference implementation:
//!
//! - **identity**: opaque party identifiers.
//! - **ledger**: atomic value transfers ([`ledger::ValueLedger`]).
//! - **height**: the monotonically increasing height oracle.
//! - **events**: fire-and-forget audit sinks.
//! - **crypto**: Ed25519/BLAKE3 for the signed-command layer.
//! - **config**: engine constants and the injected [`config::EngineConfig`].
//!
//! ## Design Philosophy
//!
//! 1. Every seam is a trait; every trait has an in-memory implementation
//!    good enough for tests and replay.
//! 2. All value arithmetic is checked.
//! 3. Time is height. Wall clocks only appear in audit timestamps.

pub mod config;
pub mod crypto;
pub mod events;
pub mod height;
pub mod identity;
pub mod ledger;

pub use config::EngineConfig;
pub use events::{Event, EventSink};
pub use height::HeightOracle;
pub use identity::Identity;
pub use ledger::{LedgerError, TransferLeg, ValueLedger};
