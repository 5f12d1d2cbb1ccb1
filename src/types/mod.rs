//! Core type definitions shared across the locator, service and tool layers.

pub mod locate;

pub use locate::*;
