//! Core domain types
//!
//! The business entities shared between the rotation engine, the directory
//! client, and the CLI: transfer jobs and their terminal outcomes, per-cycle
//! results, provisioned identities, and the externally published snapshots.

pub mod cycle;
pub mod identity;
pub mod job;
pub mod status;
pub mod step;
