//! Rotor Engine
//!
//! The quota-rotation transfer engine. Drives an external transfer tool
//! through a sequence of disposable directory identities: provision, grant
//! upload rights, transfer under the identity until the provider quota is
//! hit, discard, rotate.
//!
//! The crate is organized around the [`engine::RotationEngine`] and the
//! collaborators it takes by trait:
//! - [`supervise::TransferRunner`] runs one tool invocation to completion
//! - [`status::StatusSink`] receives externally visible snapshots
//! - [`notify::Notifier`] carries terminal notifications to operators
//! - [`step::StepChannel`] gates actions on operator approval
//! - `rotor_directory::DirectoryProvider` performs identity lifecycle calls

pub mod command;
pub mod config;
pub mod engine;
mod files;
pub mod lifecycle;
pub mod notify;
pub mod progress;
pub mod status;
pub mod step;
pub mod supervise;

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod testing;
