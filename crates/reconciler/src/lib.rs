//! Reconciles declared database services, their allowlists and configuration
//! objects against the remote provisioning API.
//!
//! The controllers are generic over [`dps_provisioning::ProvisioningClient`] so
//! the same code drives the HTTP client in production and the in-memory mock in
//! tests. Controllers hold no per-resource state and can reconcile many
//! resources concurrently.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod allowlist;
mod config;
mod error;
mod poll;
mod restart;
mod schema;
mod service;
mod values;

pub use allowlist::{AllowlistController, AllowlistSpec};
pub use config::{ConfigObjectController, ConfigSpec};
pub use error::{ApplyPhase, Error, ErrorKind, Result};
pub use poll::{Poll, PollOptions, PollTarget, poll_until};
pub use restart::RestartSafetyValidator;
pub use schema::{Mutability, Presence, ServiceField, ServicePlan, ServiceSpec, changed_fields, plan};
pub use service::{ControllerConfig, ExistingService, ServiceLifecycleController};
pub use values::{ApplyReport, ConfigTarget, ConfigValueReconciler, ConfigValues, ValueDiff};
