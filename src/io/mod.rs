//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `mqtt` - MQTT link: client lifecycle, event loop task, command
//!   publishing

pub mod mqtt;

// Re-export commonly used types
pub use mqtt::{
    effective_client_id, parse_broker_addr, spawn_publish, MqttLink, SharedPanel,
    CONNECT_TIMEOUT, GET_TOPIC, RECONNECT_PERIOD,
};
