//! Mirroring of externally managed things.
//!
//! # Responsibility
//! - Track which things the device registry currently reports as live.
//! - Apply appear/disappear notifications to the store.
//! - Periodically delete things whose removal was never reported.

pub mod bridge;
pub mod sweeper;

pub use bridge::{ActiveThings, ThingBridge};
pub use sweeper::{SweepConfig, SweepError, ThingSweeper};
