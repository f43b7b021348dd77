//! Target pool resource
//!
//! Instances are configured as `zone/name` and sent to the provider as
//! instance URLs; the read path converts them back.

use gcompute_common::{AttrValue, Attributes, Error, Result, Scope, ScopeKind};
use once_cell::sync::Lazy;
use serde_json::Value;

use super::{resource_url, Location, ResourceHandler, COMPUTE_BASE_URL};
use crate::schema::{FieldKind, FieldSpec, ResourceDescriptor};

const TYPE_NAME: &str = "google_compute_target_pool";

static SCHEMA: Lazy<ResourceDescriptor> = Lazy::new(|| {
    ResourceDescriptor::new(TYPE_NAME, "name")
        .field(FieldSpec::required("name", "name", FieldKind::String).force_new())
        .field(FieldSpec::optional("description", "description", FieldKind::String).force_new())
        .field(
            FieldSpec::optional("instances", "instances", FieldKind::StringList)
                .describe("Member instances as zone/name"),
        )
        .field(
            FieldSpec::optional("health_checks", "healthChecks", FieldKind::StringList)
                .describe("Self links of the HTTP health checks probing the members"),
        )
        .field(
            FieldSpec::optional("session_affinity", "sessionAffinity", FieldKind::String)
                .with_default("NONE")
                .force_new(),
        )
        .field(FieldSpec::optional("failover_ratio", "failoverRatio", FieldKind::Float).force_new())
        .field(FieldSpec::optional("backup_pool", "backupPool", FieldKind::String).force_new())
        .field(FieldSpec::computed("self_link", "selfLink", FieldKind::String))
});

pub struct TargetPoolResource;

/// `zone/name` to an instance URL; full URLs pass through
fn instance_url(project: &str, reference: &str) -> Result<String> {
    if reference.starts_with(COMPUTE_BASE_URL) {
        return Ok(reference.to_string());
    }
    match reference.split_once('/') {
        Some((zone, name)) if !zone.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(resource_url(project, &Scope::Zonal(zone.to_string()), "instances", name))
        }
        _ => Err(Error::validation(
            TYPE_NAME,
            format!("instance \"{}\" must be of the form zone/name", reference),
        )),
    }
}

/// Instance URL back to `zone/name`; anything unrecognized is kept verbatim
fn instance_reference(url: &str) -> String {
    let segments: Vec<&str> = url.rsplitn(4, '/').collect();
    match segments.as_slice() {
        [name, "instances", zone, rest] if rest.ends_with("/zones") => format!("{}/{}", zone, name),
        _ => url.to_string(),
    }
}

impl ResourceHandler for TargetPoolResource {
    fn descriptor(&self) -> &ResourceDescriptor {
        &SCHEMA
    }

    fn collection(&self) -> &'static str {
        "targetPools"
    }

    fn scope_kind(&self) -> ScopeKind {
        ScopeKind::Regional
    }

    fn build_request(&self, config: &Attributes, location: &Location<'_>) -> Result<Value> {
        let mut body = self.descriptor().to_request(config);
        if let Some(Value::Array(instances)) = body.get_mut("instances") {
            for entry in instances.iter_mut() {
                if let Value::String(reference) = entry {
                    *entry = Value::String(instance_url(location.project, reference)?);
                }
            }
        }
        Ok(body)
    }

    fn populate_state(&self, remote: &Value) -> Result<Attributes> {
        let mut attrs = self.descriptor().from_response(remote);
        if let Some(urls) = attrs.get("instances").and_then(AttrValue::as_string_list) {
            let references: Vec<String> = urls.iter().map(|u| instance_reference(u)).collect();
            attrs.insert("instances".to_string(), references.into());
        }
        Ok(attrs)
    }
}
