//! Persistent disk resource

use gcompute_common::{AttrValue, Attributes, Result, ScopeKind};
use once_cell::sync::Lazy;
use serde_json::Value;

use super::{resource_url, Location, ResourceHandler};
use crate::schema::{FieldKind, FieldSpec, ResourceDescriptor};

static SCHEMA: Lazy<ResourceDescriptor> = Lazy::new(|| {
    ResourceDescriptor::new("google_compute_disk", "name")
        .field(FieldSpec::required("name", "name", FieldKind::String).force_new())
        .field(
            FieldSpec::optional_computed("size_gb", "sizeGb", FieldKind::Int)
                .force_new()
                .describe("Size in GB; derived from the image when unset"),
        )
        .field(
            FieldSpec::optional("type", "type", FieldKind::String)
                .with_default("pd-standard")
                .force_new(),
        )
        .field(
            FieldSpec::optional("image", "sourceImage", FieldKind::String)
                .force_new()
                .describe("Image to initialize the disk from"),
        )
        .field(FieldSpec::computed("self_link", "selfLink", FieldKind::String))
});

pub struct DiskResource;

impl ResourceHandler for DiskResource {
    fn descriptor(&self) -> &ResourceDescriptor {
        &SCHEMA
    }

    fn collection(&self) -> &'static str {
        "disks"
    }

    fn scope_kind(&self) -> ScopeKind {
        ScopeKind::Zonal
    }

    fn build_request(&self, config: &Attributes, location: &Location<'_>) -> Result<Value> {
        let mut body = self.descriptor().to_request(config);
        let type_url = body
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.contains('/'))
            .map(|t| resource_url(location.project, location.scope, "diskTypes", t));
        if let Some(url) = type_url {
            body["type"] = Value::String(url);
        }
        Ok(body)
    }

    fn populate_state(&self, remote: &Value) -> Result<Attributes> {
        let mut attrs = self.descriptor().from_response(remote);
        let short = attrs
            .get("type")
            .and_then(AttrValue::as_str)
            .and_then(|url| url.rsplit('/').next())
            .map(str::to_string);
        if let Some(short) = short {
            attrs.insert("type".to_string(), short.into());
        }
        Ok(attrs)
    }
}
