//! Domain layer - Certificate resource types and port definitions
//!
//! This module defines the resource records and the traits (ports) that
//! the Compute Engine and Kubernetes adapters implement.

pub mod ports;

pub use ports::*;
