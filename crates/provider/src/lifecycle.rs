//! Resource lifecycle
//!
//! Drives one resource instance through create, read, update and delete
//! against the compute API. Each mutating call submits one operation, waits
//! for it to settle and moves the instance's [`ResourceState`] through its
//! phases:
//!
//! ```text
//! absent --create--> creating --ok--> present
//! present --update--> updating --ok--> present
//! present --delete--> deleting --ok--> absent
//! present --read--> present | absent (entity vanished)
//! ```
//!
//! A failed create forgets the optimistically assigned identifier. A failed
//! update keeps it, the entity still exists. When the outcome is unknown
//! (timeout, cancellation, lost operation) the in-flight phase is kept and
//! further mutations are refused until a read reconciles the state.

use gcompute_common::{AttrValue, Attributes, Error, Operation, OperationHandle, OperationKind, ResourcePhase, Result, Scope};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::ProviderContext;
use crate::resources::{Location, ResourceHandler, ResourceKind};
use crate::state::ResourceState;
use crate::translate;
use crate::waiter::WaitConfig;

/// Result of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// State refreshed from the remote entity
    Refreshed,
    /// The remote entity is gone; the state was cleared
    Vanished,
    /// The state had no identifier; nothing was read
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete, either locally or remotely
    AlreadyAbsent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    NoOp,
    Create,
    Update,
    Replace,
    Delete,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::NoOp => write!(f, "no-op"),
            PlanAction::Create => write!(f, "create"),
            PlanAction::Update => write!(f, "update"),
            PlanAction::Replace => write!(f, "replace"),
            PlanAction::Delete => write!(f, "delete"),
        }
    }
}

/// One field whose value differs between state and configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub field: String,
    pub before: AttrValue,
    pub after: AttrValue,
    pub force_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub action: PlanAction,
    pub changes: Vec<AttributeChange>,
    /// Changed fields that cannot be updated in place
    pub requires_replace: Vec<String>,
}

impl Plan {
    fn no_op() -> Self {
        Self {
            action: PlanAction::NoOp,
            changes: Vec::new(),
            requires_replace: Vec::new(),
        }
    }
}

/// Both unset, or equal
fn same_value(before: &AttrValue, after: &AttrValue) -> bool {
    (before.is_unset() && after.is_unset()) || before == after
}

/// Lifecycle calls for one resource type
pub struct Lifecycle<'a> {
    ctx: &'a ProviderContext,
    handler: &'static dyn ResourceHandler,
    wait: WaitConfig,
}

impl<'a> Lifecycle<'a> {
    pub fn new(ctx: &'a ProviderContext, kind: ResourceKind) -> Self {
        Self {
            ctx,
            handler: kind.handler(),
            wait: ctx.config().wait_config(),
        }
    }

    /// Override the waiter timing for calls made through this value
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn handler(&self) -> &'static dyn ResourceHandler {
        self.handler
    }

    fn label(&self, id: &str) -> String {
        format!("{}.{}", self.handler.type_name(), id)
    }

    fn mutation_key(&self, scope: &Scope, id: &str) -> String {
        format!("{}/{}/{}", scope.path_segment(), self.handler.collection(), id)
    }

    fn check_phase(&self, state: &ResourceState, label: &str, kind: OperationKind) -> Result<()> {
        if state.phase != ResourcePhase::required_for(kind) {
            return Err(Error::InvalidStateTransition {
                resource: label.to_string(),
                from: state.phase.to_string(),
                to: ResourcePhase::in_flight(kind).to_string(),
            });
        }
        Ok(())
    }

    /// Refuse to start a remote side effect once the context is cancelled
    fn check_not_cancelled(&self, label: &str, kind: OperationKind) -> Result<()> {
        if self.ctx.cancellation_token().is_cancelled() {
            warn!(resource = %label, %kind, "Cancelled, not submitting");
            return Err(Error::Cancelled {
                kind,
                resource: label.to_string(),
                operation: None,
            });
        }
        Ok(())
    }

    async fn settle(&self, op: &Operation, scope: &Scope, label: &str, kind: OperationKind) -> Result<Operation> {
        let handle = OperationHandle::new(op, scope.clone(), label, kind);
        let outcome = self.ctx.waiter(self.wait.clone()).wait(handle.clone()).await;
        translate::settle(&handle, outcome)
    }

    /// Create the entity described by `config` and record it in `state`
    pub async fn create(&self, state: &mut ResourceState, config: &Attributes) -> Result<()> {
        let descriptor = self.handler.descriptor();
        let config = descriptor.prepare(config)?;
        let id = descriptor
            .instance_id(&config)
            .ok_or_else(|| Error::validation(descriptor.type_name, format!("\"{}\" is not set", descriptor.id_field)))?;
        let label = self.label(&id);
        self.check_phase(state, &label, OperationKind::Insert)?;

        let client = self.ctx.client_for(self.handler);
        let _guard = self.ctx.begin_mutation(&self.mutation_key(client.scope(), &id), OperationKind::Insert)?;

        let location = Location {
            project: &self.ctx.config().project,
            scope: client.scope(),
        };
        let body = self.handler.build_request(&config, &location)?;
        self.check_not_cancelled(&label, OperationKind::Insert)?;
        let op = client
            .insert(body)
            .await
            .map_err(|e| translate::submission(OperationKind::Insert, &label, e))?;

        state.id = Some(id.clone());
        state.phase = ResourcePhase::Creating;
        state.attributes = config;
        info!(resource = %label, operation = %op.name, "Creating resource");

        match self.settle(&op, client.scope(), &label, OperationKind::Insert).await {
            Ok(_) => {}
            Err(e) if e.is_indeterminate() => {
                warn!(resource = %label, error = %e, "Create outcome unknown");
                return Err(e);
            }
            Err(e) => {
                warn!(resource = %label, error = %e, "Create failed, removing from state");
                state.clear();
                return Err(e);
            }
        }

        state.phase = ResourcePhase::Present;
        info!(resource = %label, "Resource created");

        match self.read(state).await? {
            ReadOutcome::Refreshed => Ok(()),
            _ => Err(Error::NotFound {
                kind: self.handler.type_name().to_string(),
                id,
            }),
        }
    }

    /// Refresh `state` from the remote entity. A vanished entity clears the
    /// state and is not an error.
    pub async fn read(&self, state: &mut ResourceState) -> Result<ReadOutcome> {
        let Some(id) = state.id.clone() else {
            return Ok(ReadOutcome::Absent);
        };
        let label = self.label(&id);
        let client = self.ctx.client_for(self.handler);

        match translate::lookup(&label, client.get(&id).await)? {
            Some(remote) => {
                state.attributes = self.handler.populate_state(&remote)?;
                state.phase = ResourcePhase::Present;
                Ok(ReadOutcome::Refreshed)
            }
            None => {
                warn!(resource = %label, "Resource no longer exists, removing from state");
                state.clear();
                Ok(ReadOutcome::Vanished)
            }
        }
    }

    /// Apply in-place changes. Changes to force-new fields are refused
    /// without contacting the provider.
    pub async fn update(&self, state: &mut ResourceState, config: &Attributes) -> Result<()> {
        let descriptor = self.handler.descriptor();
        let config = descriptor.prepare(config)?;
        let id = match state.id.clone() {
            Some(id) => id,
            None => {
                return Err(Error::InvalidStateTransition {
                    resource: self.handler.type_name().to_string(),
                    from: state.phase.to_string(),
                    to: ResourcePhase::Updating.to_string(),
                })
            }
        };
        let label = self.label(&id);
        self.check_phase(state, &label, OperationKind::Patch)?;

        let changes = self.diff(&state.attributes, &config);
        let replace: Vec<String> = changes.iter().filter(|c| c.force_new).map(|c| c.field.clone()).collect();
        if !replace.is_empty() {
            return Err(Error::RequiresReplacement {
                resource: label,
                fields: replace,
            });
        }

        let client = self.ctx.client_for(self.handler);
        let _guard = self.ctx.begin_mutation(&self.mutation_key(client.scope(), &id), OperationKind::Patch)?;

        let location = Location {
            project: &self.ctx.config().project,
            scope: client.scope(),
        };
        let body = self.handler.build_request(&config, &location)?;
        self.check_not_cancelled(&label, OperationKind::Patch)?;
        let op = client
            .patch(&id, body)
            .await
            .map_err(|e| translate::submission(OperationKind::Patch, &label, e))?;

        state.phase = ResourcePhase::Updating;
        info!(resource = %label, operation = %op.name, changed = changes.len(), "Updating resource");

        match self.settle(&op, client.scope(), &label, OperationKind::Patch).await {
            Ok(_) => {}
            Err(e) if e.is_indeterminate() => {
                warn!(resource = %label, error = %e, "Update outcome unknown");
                return Err(e);
            }
            Err(e) => {
                warn!(resource = %label, error = %e, "Update failed");
                state.phase = ResourcePhase::Present;
                return Err(e);
            }
        }

        state.phase = ResourcePhase::Present;
        info!(resource = %label, "Resource updated");
        self.read(state).await.map(|_| ())
    }

    /// Delete the entity. An entity already gone remotely converges to
    /// absent without error.
    pub async fn delete(&self, state: &mut ResourceState) -> Result<DeleteOutcome> {
        let Some(id) = state.id.clone() else {
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        let label = self.label(&id);
        self.check_phase(state, &label, OperationKind::Delete)?;

        let client = self.ctx.client_for(self.handler);
        let _guard = self.ctx.begin_mutation(&self.mutation_key(client.scope(), &id), OperationKind::Delete)?;

        self.check_not_cancelled(&label, OperationKind::Delete)?;
        let op = match client.delete(&id).await {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                info!(resource = %label, "Resource already gone");
                state.clear();
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
            Err(e) => return Err(translate::submission(OperationKind::Delete, &label, e)),
        };

        state.phase = ResourcePhase::Deleting;
        info!(resource = %label, operation = %op.name, "Deleting resource");

        match self.settle(&op, client.scope(), &label, OperationKind::Delete).await {
            Ok(_) => {
                state.clear();
                info!(resource = %label, "Resource deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_indeterminate() => {
                warn!(resource = %label, error = %e, "Delete outcome unknown");
                Err(e)
            }
            Err(e) => {
                warn!(resource = %label, error = %e, "Delete failed");
                state.phase = ResourcePhase::Present;
                Err(e)
            }
        }
    }

    /// Adopt an existing remote entity by identifier
    pub async fn import(&self, id: &str) -> Result<ResourceState> {
        let mut state = ResourceState::with_id(id);
        match self.read(&mut state).await? {
            ReadOutcome::Refreshed => {
                info!(resource = %self.label(id), "Resource imported");
                Ok(state)
            }
            _ => Err(Error::NotFound {
                kind: self.handler.type_name().to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// Fields whose configured value differs from the recorded one. Unset
    /// computed fields are left to the provider.
    fn diff(&self, prior: &Attributes, config: &Attributes) -> Vec<AttributeChange> {
        self.handler
            .descriptor()
            .settable_fields()
            .filter_map(|spec| {
                let after = config.get(spec.name).cloned().unwrap_or(AttrValue::Null);
                if spec.computed && after.is_unset() {
                    return None;
                }
                let before = prior.get(spec.name).cloned().unwrap_or(AttrValue::Null);
                if same_value(&before, &after) {
                    return None;
                }
                Some(AttributeChange {
                    field: spec.name.to_string(),
                    before,
                    after,
                    force_new: spec.force_new,
                })
            })
            .collect()
    }

    /// Work needed to take `prior` to `config`; `None` means the instance
    /// should not exist
    pub fn plan(&self, prior: &ResourceState, config: Option<&Attributes>) -> Result<Plan> {
        if !prior.phase.is_settled() {
            let target = if config.is_some() { ResourcePhase::Present } else { ResourcePhase::Absent };
            return Err(Error::InvalidStateTransition {
                resource: self.label(prior.id().unwrap_or("-")),
                from: prior.phase.to_string(),
                to: target.to_string(),
            });
        }
        let Some(config) = config else {
            if prior.exists() {
                return Ok(Plan {
                    action: PlanAction::Delete,
                    ..Plan::no_op()
                });
            }
            return Ok(Plan::no_op());
        };

        let config = self.handler.descriptor().prepare(config)?;
        let changes = self.diff(&prior.attributes, &config);

        if !prior.exists() {
            return Ok(Plan {
                action: PlanAction::Create,
                changes,
                requires_replace: Vec::new(),
            });
        }

        let requires_replace: Vec<String> = changes.iter().filter(|c| c.force_new).map(|c| c.field.clone()).collect();
        let action = if !requires_replace.is_empty() {
            PlanAction::Replace
        } else if !changes.is_empty() {
            PlanAction::Update
        } else {
            PlanAction::NoOp
        };

        Ok(Plan {
            action,
            changes,
            requires_replace,
        })
    }

    /// Plan, then carry the plan out. Replacement deletes the old entity
    /// before creating the new one.
    pub async fn apply(&self, state: &mut ResourceState, config: Option<&Attributes>) -> Result<Plan> {
        let plan = self.plan(state, config)?;
        info!(
            resource_type = self.handler.type_name(),
            id = state.id().unwrap_or("-"),
            action = %plan.action,
            "Applying plan"
        );

        match (plan.action, config) {
            (PlanAction::NoOp, _) => {}
            (PlanAction::Create, Some(config)) => self.create(state, config).await?,
            (PlanAction::Update, Some(config)) => self.update(state, config).await?,
            (PlanAction::Replace, Some(config)) => {
                self.delete(state).await?;
                self.create(state, config).await?;
            }
            (PlanAction::Delete, _) => {
                self.delete(state).await?;
            }
            (action, None) => {
                return Err(Error::Internal(format!("{} planned without a configuration", action)));
            }
        }
        Ok(plan)
    }
}
