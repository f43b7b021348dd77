//! Simulated compute backend
//!
//! An in-memory [`ComputeApi`] with provider-like semantics: mutating calls
//! return a pending operation, the entity change becomes visible once the
//! operation reports `DONE`, and missing entities or operations answer 404.
//!
//! Operation progress and failures are scripted, which makes it the test
//! double for the waiter and lifecycle layers. The CLI uses it as a local
//! sandbox, persisting the entity table between invocations.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use gcompute_common::{
    ApiError, Operation, OperationErrorItem, OperationErrorPayload, OperationKind, OperationStatus, Scope,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::ComputeApi;
use crate::resources::resource_url;

/// Fields the server owns; a patch never overwrites them
const SERVER_FIELDS: &[&str] = &["name", "id", "selfLink", "creationTimestamp", "kind"];

/// Record of one mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub kind: OperationKind,
    pub collection: String,
    pub name: String,
}

enum Effect {
    Put { key: String, entity: Value },
    Remove { key: String },
}

struct SimOperation {
    operation: Operation,
    scope: Scope,
    script: VecDeque<OperationStatus>,
    failure: Option<Vec<OperationErrorItem>>,
    effect: Option<Effect>,
    polls: u32,
}

struct SimState {
    entities: BTreeMap<String, Value>,
    operations: HashMap<String, SimOperation>,
    status_script: Vec<OperationStatus>,
    next_failure: Option<Vec<OperationErrorItem>>,
    submission_failures: VecDeque<ApiError>,
    poll_failures: VecDeque<ApiError>,
    submissions: Vec<Submission>,
    next_id: u64,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            operations: HashMap::new(),
            status_script: vec![OperationStatus::Pending, OperationStatus::Running, OperationStatus::Done],
            next_failure: None,
            submission_failures: VecDeque::new(),
            poll_failures: VecDeque::new(),
            submissions: Vec::new(),
            next_id: 1,
        }
    }
}

/// In-memory compute backend
pub struct SimulatedCompute {
    project: String,
    inner: Mutex<SimState>,
}

fn entity_key(collection: &str, scope: &Scope, name: &str) -> String {
    format!("{}/{}/{}", scope.path_segment(), collection, name)
}

impl SimulatedCompute {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            inner: Mutex::new(SimState::default()),
        }
    }

    /// Load the entity table written by [`SimulatedCompute::save`]; a missing
    /// file yields an empty backend
    pub fn load(path: &Path, project: impl Into<String>) -> anyhow::Result<Self> {
        let sim = Self::new(project);
        if path.exists() {
            let content = std::fs::read(path)?;
            let entities: BTreeMap<String, Value> = serde_json::from_slice(&content)?;
            sim.inner.lock().entities = entities;
        }
        Ok(sim)
    }

    /// Persist the entity table. Operations are not persisted.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_vec_pretty(&self.inner.lock().entities)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Statuses reported by successive polls of operations submitted from
    /// now on. The last status repeats once the script runs out; an empty
    /// script settles operations on the first poll.
    pub fn set_status_script(&self, script: Vec<OperationStatus>) {
        self.inner.lock().status_script = script;
    }

    /// Settle the next submitted operation with this error payload
    pub fn fail_next_operation(&self, errors: Vec<OperationErrorItem>) {
        self.inner.lock().next_failure = Some(errors);
    }

    /// Reject the next mutating call outright
    pub fn fail_next_submission(&self, error: ApiError) {
        self.inner.lock().submission_failures.push_back(error);
    }

    /// Answer the next status queries with these errors
    pub fn inject_poll_errors(&self, errors: Vec<ApiError>) {
        self.inner.lock().poll_failures.extend(errors);
    }

    /// Remove an entity behind the provider's back
    pub fn remove_entity(&self, collection: &str, scope: &Scope, name: &str) -> bool {
        self.inner
            .lock()
            .entities
            .remove(&entity_key(collection, scope, name))
            .is_some()
    }

    pub fn entity(&self, collection: &str, scope: &Scope, name: &str) -> Option<Value> {
        self.inner.lock().entities.get(&entity_key(collection, scope, name)).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.lock().entities.len()
    }

    /// Number of status queries made against an operation
    pub fn poll_count(&self, operation: &str) -> u32 {
        self.inner
            .lock()
            .operations
            .get(operation)
            .map(|op| op.polls)
            .unwrap_or(0)
    }

    /// Every mutating call received, in order
    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().submissions.clone()
    }

    fn self_link(&self, collection: &str, scope: &Scope, name: &str) -> String {
        resource_url(&self.project, scope, collection, name)
    }

    fn submit(
        &self,
        state: &mut SimState,
        kind: OperationKind,
        scope: &Scope,
        target_link: String,
        effect: Effect,
    ) -> Operation {
        let name = format!("operation-{:06}", state.next_id);
        state.next_id += 1;

        let mut operation = Operation::new(name.clone(), OperationStatus::Pending);
        operation.operation_type = Some(kind.to_string());
        operation.target_link = Some(target_link);

        state.operations.insert(
            name,
            SimOperation {
                operation: operation.clone(),
                scope: scope.clone(),
                script: if state.status_script.is_empty() {
                    VecDeque::from([OperationStatus::Done])
                } else {
                    state.status_script.iter().copied().collect()
                },
                failure: state.next_failure.take(),
                effect: Some(effect),
                polls: 0,
            },
        );
        operation
    }

    fn begin_submission(
        &self,
        state: &mut SimState,
        kind: OperationKind,
        collection: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        state.submissions.push(Submission {
            kind,
            collection: collection.to_string(),
            name: name.to_string(),
        });
        match state.submission_failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Server-side defaults and representation quirks of the compute API
fn apply_server_defaults(collection: &str, entity: &mut Value) {
    if collection == "disks" {
        let size = match entity.get("sizeGb") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "10".to_string(),
        };
        entity["sizeGb"] = Value::String(size);
    }
}

#[async_trait]
impl ComputeApi for SimulatedCompute {
    async fn insert(&self, collection: &str, scope: &Scope, body: Value) -> Result<Operation, ApiError> {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::http(400, "Required field 'name' not specified"))?
            .to_string();

        let mut state = self.inner.lock();
        self.begin_submission(&mut state, OperationKind::Insert, collection, &name)?;

        let key = entity_key(collection, scope, &name);
        if state.entities.contains_key(&key) {
            return Err(ApiError::http(409, format!("The resource '{}' already exists", key)));
        }

        let self_link = self.self_link(collection, scope, &name);
        let mut entity = body;
        apply_server_defaults(collection, &mut entity);
        entity["id"] = json!(format!("{}", 1_000_000 + state.next_id));
        entity["selfLink"] = json!(self_link.clone());
        entity["creationTimestamp"] = json!(chrono::Utc::now().to_rfc3339());

        Ok(self.submit(&mut state, OperationKind::Insert, scope, self_link, Effect::Put { key, entity }))
    }

    async fn patch(&self, collection: &str, scope: &Scope, name: &str, body: Value) -> Result<Operation, ApiError> {
        let mut state = self.inner.lock();
        self.begin_submission(&mut state, OperationKind::Patch, collection, name)?;

        let key = entity_key(collection, scope, name);
        let existing = state
            .entities
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("The resource '{}' was not found", key)))?;

        let mut entity = body;
        if !entity.is_object() {
            return Err(ApiError::http(400, "Request body must be an object"));
        }
        for field in SERVER_FIELDS {
            match existing.get(*field) {
                Some(v) => entity[*field] = v.clone(),
                None => {
                    if let Some(obj) = entity.as_object_mut() {
                        obj.remove(*field);
                    }
                }
            }
        }
        apply_server_defaults(collection, &mut entity);

        let self_link = self.self_link(collection, scope, name);
        Ok(self.submit(&mut state, OperationKind::Patch, scope, self_link, Effect::Put { key, entity }))
    }

    async fn delete(&self, collection: &str, scope: &Scope, name: &str) -> Result<Operation, ApiError> {
        let mut state = self.inner.lock();
        self.begin_submission(&mut state, OperationKind::Delete, collection, name)?;

        let key = entity_key(collection, scope, name);
        if !state.entities.contains_key(&key) {
            return Err(ApiError::not_found(format!("The resource '{}' was not found", key)));
        }

        let self_link = self.self_link(collection, scope, name);
        Ok(self.submit(&mut state, OperationKind::Delete, scope, self_link, Effect::Remove { key }))
    }

    async fn get(&self, collection: &str, scope: &Scope, name: &str) -> Result<Value, ApiError> {
        let key = entity_key(collection, scope, name);
        self.inner
            .lock()
            .entities
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("The resource '{}' was not found", key)))
    }

    async fn get_operation(&self, scope: &Scope, name: &str) -> Result<Operation, ApiError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let op = state
            .operations
            .get_mut(name)
            .filter(|op| &op.scope == scope)
            .ok_or_else(|| ApiError::not_found(format!("The resource 'operations/{}' was not found", name)))?;
        op.polls += 1;

        if let Some(e) = state.poll_failures.pop_front() {
            return Err(e);
        }

        if !op.operation.status.is_terminal() {
            let next = op.script.pop_front().unwrap_or(op.operation.status);
            op.operation.status = next;

            if next.is_terminal() {
                match op.failure.take() {
                    Some(errors) => op.operation.error = Some(OperationErrorPayload { errors }),
                    None => match op.effect.take() {
                        Some(Effect::Put { key, entity }) => {
                            state.entities.insert(key, entity);
                        }
                        Some(Effect::Remove { key }) => {
                            state.entities.remove(&key);
                        }
                        None => {}
                    },
                }
            }
        }

        debug!(operation = %name, status = %op.operation.status, polls = op.polls, "Simulated operation status");
        Ok(op.operation.clone())
    }
}
