//! Domain layer - Core types and port definitions
//!
//! This module defines the normalized volume record and the traits (ports)
//! that adapters implement, following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
