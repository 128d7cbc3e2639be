//! Domain models - phases, lights, commands and link events
//!
//! Canonical data types used throughout the panel:
//! - `Phase` - closed enumeration of device-reported light phases
//! - `LightSet` - the five indicator lights
//! - `StatusUpdate` - decoded status payload
//! - `Command` - operator command tokens
//! - `LinkEvent` - transport events consumed by the panel dispatcher

pub mod types;

// Re-export commonly used types at module level
pub use types::{Command, ConnStatus, LightSet, LinkEvent, Phase, StatusUpdate};
