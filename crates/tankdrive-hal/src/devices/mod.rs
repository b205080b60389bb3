//! Hardware adapters shipped with the crate.

pub mod sim;
