//! Services - panel state and event dispatch
//!
//! This module contains the panel's logic:
//! - `panel` - Owning state object, LinkEvent dispatcher, command gating,
//!   staleness checking

pub mod panel;

// Re-export commonly used types
pub use panel::{Fields, OutboundCommand, Panel, STALE_AFTER, STALE_CHECK_PERIOD};
