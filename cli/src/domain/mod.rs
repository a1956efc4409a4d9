//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`
//! sockets. All functions are synchronous and take data in, returning data out.

pub mod classify;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod docker;
pub mod error;
pub mod instance;
pub mod port;
pub mod reconcile;
pub mod remote;
pub mod state;

pub use config::ProvisionConfig;
pub use error::{
    BackupError, ConfigError, CredentialError, DestroyError, ErrorKind, PortAllocationError,
    ProvisionError, RemoteError, StateError, Step,
};
pub use reconcile::{ReconcileAction, ReconcilePlan};
pub use remote::CommandResult;
