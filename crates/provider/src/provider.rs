//! gcompute Provider
//!
//! Orchestrator-facing entry points. Every call names its resource type,
//! dispatches through the [`ResourceKind`] registry and reports failures as
//! diagnostics next to the resulting state, so the caller can always persist
//! what the lifecycle layer recorded.

use std::collections::BTreeMap;

use gcompute_common::{Attributes, Error};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::context::ProviderContext;
use crate::lifecycle::{Lifecycle, Plan, ReadOutcome};
use crate::resources::ResourceKind;
use crate::schema::ResourceDescriptor;
use crate::state::ResourceState;
use crate::translate::Diagnostic;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub version: &'static str,
    pub resource_schemas: BTreeMap<&'static str, ResourceDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ReadResponse {
    pub new_state: ResourceState,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct PlanResponse {
    pub plan: Option<Plan>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ApplyResponse {
    /// State after the call, including partial progress on failure
    pub new_state: ResourceState,
    pub plan: Option<Plan>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ImportResponse {
    pub imported: Option<ResourceState>,
    pub diagnostics: Vec<Diagnostic>,
}

fn diagnostics_for(e: &Error) -> Vec<Diagnostic> {
    vec![Diagnostic::from(e)]
}

/// gcompute provider
#[derive(Clone)]
pub struct Provider {
    ctx: ProviderContext,
}

impl Provider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub fn get_provider_schema(&self) -> ProviderSchema {
        debug!("GetProviderSchema called");
        ProviderSchema {
            version: crate::VERSION,
            resource_schemas: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind.type_name(), kind.handler().descriptor().clone()))
                .collect(),
        }
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &Attributes) -> Vec<Diagnostic> {
        debug!("ValidateResourceConfig called for {}", type_name);
        let result = ResourceKind::from_type_name(type_name)
            .and_then(|kind| kind.handler().descriptor().validate(config));
        match result {
            Ok(()) => Vec::new(),
            Err(e) => diagnostics_for(&e),
        }
    }

    pub async fn read_resource(&self, type_name: &str, current: ResourceState) -> ReadResponse {
        info!("ReadResource called for {}", type_name);
        let mut state = current;
        let previous_id = state.id.clone();
        let result = match ResourceKind::from_type_name(type_name) {
            Ok(kind) => Lifecycle::new(&self.ctx, kind).read(&mut state).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(ReadOutcome::Vanished) => vec![Diagnostic::warning(
                "Resource no longer exists",
                format!(
                    "{}.{} was not found remotely and has been removed from state",
                    type_name,
                    previous_id.unwrap_or_default()
                ),
            )],
            Ok(_) => Vec::new(),
            Err(e) => diagnostics_for(&e),
        };

        ReadResponse {
            new_state: state,
            diagnostics,
        }
    }

    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior: &ResourceState,
        config: Option<&Attributes>,
    ) -> PlanResponse {
        debug!("PlanResourceChange called for {}", type_name);
        let result = ResourceKind::from_type_name(type_name)
            .and_then(|kind| Lifecycle::new(&self.ctx, kind).plan(prior, config));

        match result {
            Ok(plan) => PlanResponse {
                plan: Some(plan),
                diagnostics: Vec::new(),
            },
            Err(e) => PlanResponse {
                plan: None,
                diagnostics: diagnostics_for(&e),
            },
        }
    }

    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior: ResourceState,
        config: Option<&Attributes>,
    ) -> ApplyResponse {
        info!("ApplyResourceChange called for {}", type_name);
        let mut state = prior;

        let kind = match ResourceKind::from_type_name(type_name) {
            Ok(kind) => kind,
            Err(e) => {
                return ApplyResponse {
                    new_state: state,
                    plan: None,
                    diagnostics: diagnostics_for(&e),
                }
            }
        };

        match Lifecycle::new(&self.ctx, kind).apply(&mut state, config).await {
            Ok(plan) => ApplyResponse {
                new_state: state,
                plan: Some(plan),
                diagnostics: Vec::new(),
            },
            Err(e) => {
                error!(resource_type = type_name, error = %e, "Failed to apply resource change");
                ApplyResponse {
                    new_state: state,
                    plan: None,
                    diagnostics: diagnostics_for(&e),
                }
            }
        }
    }

    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> ImportResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);
        let result = match ResourceKind::from_type_name(type_name) {
            Ok(kind) => Lifecycle::new(&self.ctx, kind).import(id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(state) => ImportResponse {
                imported: Some(state),
                diagnostics: Vec::new(),
            },
            Err(e) => ImportResponse {
                imported: None,
                diagnostics: diagnostics_for(&e),
            },
        }
    }
}
