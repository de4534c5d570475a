//! Rotor Core
//!
//! Core types for the rotor quota-rotation transfer system.
//!
//! This crate contains:
//! - Domain types: jobs, cycles, identities, status snapshots
//! - Configuration: the typed config model with load-time defaults
//! - Size parsing: lenient tool-reported sizes normalized to gigabytes

pub mod config;
pub mod domain;
pub mod size;
