//! Outbound adapters implementing the domain's driven ports.

pub mod memory;
pub mod warehouse;
