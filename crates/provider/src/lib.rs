//! gcompute Provider
//!
//! Reconciliation core for compute resources: an operation waiter, the
//! create/read/update/delete lifecycle built on it, and the resource
//! registry that plugs concrete resource types into that lifecycle.

pub mod client;
pub mod config;
pub mod context;
pub mod lifecycle;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod sim;
pub mod state;
pub mod translate;
pub mod waiter;

pub use client::ComputeApi;
pub use config::ProviderConfig;
pub use context::ProviderContext;
pub use lifecycle::{DeleteOutcome, Lifecycle, Plan, PlanAction, ReadOutcome};
pub use provider::Provider;
pub use resources::ResourceKind;
pub use state::ResourceState;
pub use translate::Diagnostic;

/// Version of the provider
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
