//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports` (never from `crate::infra`, `crate::commands`,
//! or `crate::output`).

pub mod backup;
pub mod destroy;
pub mod docker;
pub mod provision;
pub mod reconcile;
pub mod remote;
pub mod status;

#[cfg(test)]
pub mod test_support;
