//! Capability traits implemented by hardware adapters.

pub mod hardware;
