//! Kubernetes Module
//!
//! Access to the cluster control plane.

pub mod client;

pub use client::*;
