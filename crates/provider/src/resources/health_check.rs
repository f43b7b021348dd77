//! HTTP and HTTPS health check resources

use gcompute_common::ScopeKind;
use once_cell::sync::Lazy;

use super::ResourceHandler;
use crate::schema::{FieldKind, FieldSpec, ResourceDescriptor};

static HTTP_SCHEMA: Lazy<ResourceDescriptor> = Lazy::new(|| health_check_schema("google_compute_http_health_check"));

static HTTPS_SCHEMA: Lazy<ResourceDescriptor> = Lazy::new(|| health_check_schema("google_compute_https_health_check"));

/// Both health check flavours share one field set, port 80 included
fn health_check_schema(type_name: &'static str) -> ResourceDescriptor {
    ResourceDescriptor::new(type_name, "name")
        .field(
            FieldSpec::required("name", "name", FieldKind::String)
                .force_new()
                .describe("Unique name of the health check"),
        )
        .field(FieldSpec::optional("description", "description", FieldKind::String))
        .field(
            FieldSpec::optional("host", "host", FieldKind::String)
                .describe("Value of the Host header sent with each probe"),
        )
        .field(FieldSpec::optional("request_path", "requestPath", FieldKind::String).with_default("/"))
        .field(FieldSpec::optional("port", "port", FieldKind::Int).with_default(80i64))
        .field(
            FieldSpec::optional("check_interval_sec", "checkIntervalSec", FieldKind::Int)
                .with_default(5i64)
                .describe("Seconds between probes"),
        )
        .field(FieldSpec::optional("timeout_sec", "timeoutSec", FieldKind::Int).with_default(5i64))
        .field(
            FieldSpec::optional("healthy_threshold", "healthyThreshold", FieldKind::Int)
                .with_default(2i64)
                .describe("Consecutive successes before a backend is marked healthy"),
        )
        .field(
            FieldSpec::optional("unhealthy_threshold", "unhealthyThreshold", FieldKind::Int)
                .with_default(2i64)
                .describe("Consecutive failures before a backend is marked unhealthy"),
        )
        .field(FieldSpec::computed("self_link", "selfLink", FieldKind::String))
}

pub struct HttpHealthCheckResource;

impl ResourceHandler for HttpHealthCheckResource {
    fn descriptor(&self) -> &ResourceDescriptor {
        &HTTP_SCHEMA
    }

    fn collection(&self) -> &'static str {
        "httpHealthChecks"
    }

    fn scope_kind(&self) -> ScopeKind {
        ScopeKind::Global
    }
}

pub struct HttpsHealthCheckResource;

impl ResourceHandler for HttpsHealthCheckResource {
    fn descriptor(&self) -> &ResourceDescriptor {
        &HTTPS_SCHEMA
    }

    fn collection(&self) -> &'static str {
        "httpsHealthChecks"
    }

    fn scope_kind(&self) -> ScopeKind {
        ScopeKind::Global
    }
}
