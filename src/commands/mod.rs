//! CLI command implementations.

pub mod hosts;
pub mod lookup;
pub mod resolve;
pub mod stats;
pub mod whois;
