//! Core types and provider traits shared by all winbridge crates.
//!
//! Platform crates implement the provider traits from [`platform`] and
//! register them through the `register_*!` macros; the runtime discovers
//! them via inventory. The value types in [`types`] are what travels
//! between the components and their callers.

pub mod command_line;
pub mod platform;
pub mod types;
