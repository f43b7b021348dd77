//! Resource schemas
//!
//! A [`ResourceDescriptor`] declares the typed fields of one resource type.
//! Each field names its configuration key and its provider API key exactly
//! once; request construction ([`ResourceDescriptor::to_request`]) and state
//! population ([`ResourceDescriptor::from_response`]) both derive from that
//! single declaration, so the write and read paths cannot drift apart.

use gcompute_common::{AttrValue, Attributes, Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Type of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
    StringList,
}

impl FieldKind {
    /// Whether `value` is an acceptable value of this kind. Null is accepted
    /// everywhere; requiredness is checked separately.
    pub fn accepts(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (_, AttrValue::Null) => true,
            (FieldKind::String, AttrValue::String(_)) => true,
            (FieldKind::Int, AttrValue::Int(_)) => true,
            (FieldKind::Float, AttrValue::Float(_) | AttrValue::Int(_)) => true,
            (FieldKind::Bool, AttrValue::Bool(_)) => true,
            (FieldKind::StringList, AttrValue::List(items)) => items.iter().all(|v| v.as_str().is_some()),
            _ => false,
        }
    }

    /// Normalize a value read back from the provider. The compute API
    /// encodes 64-bit integers as JSON strings.
    pub fn coerce(&self, value: AttrValue) -> AttrValue {
        match (self, value) {
            (FieldKind::Int, AttrValue::String(s)) => s
                .parse::<i64>()
                .map(AttrValue::Int)
                .unwrap_or(AttrValue::String(s)),
            (FieldKind::Float, AttrValue::Int(n)) => AttrValue::Float(n as f64),
            (_, value) => value,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::StringList => write!(f, "list(string)"),
        }
    }
}

/// Declaration of one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub api_name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttrValue>,
    pub force_new: bool,
    pub description: &'static str,
}

impl FieldSpec {
    fn base(name: &'static str, api_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            api_name,
            kind,
            required: false,
            optional: false,
            computed: false,
            default: None,
            force_new: false,
            description: "",
        }
    }

    pub fn required(name: &'static str, api_name: &'static str, kind: FieldKind) -> Self {
        Self {
            required: true,
            ..Self::base(name, api_name, kind)
        }
    }

    pub fn optional(name: &'static str, api_name: &'static str, kind: FieldKind) -> Self {
        Self {
            optional: true,
            ..Self::base(name, api_name, kind)
        }
    }

    /// Populated only from provider responses
    pub fn computed(name: &'static str, api_name: &'static str, kind: FieldKind) -> Self {
        Self {
            computed: true,
            ..Self::base(name, api_name, kind)
        }
    }

    /// Optional field the provider fills in when left unset
    pub fn optional_computed(name: &'static str, api_name: &'static str, kind: FieldKind) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::base(name, api_name, kind)
        }
    }

    pub fn with_default(mut self, value: impl Into<AttrValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Computed and never settable from configuration
    pub fn is_output_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Schema of one resource type
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub type_name: &'static str,
    /// Field whose value becomes the instance identifier
    pub id_field: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl ResourceDescriptor {
    pub fn new(type_name: &'static str, id_field: &'static str) -> Self {
        Self {
            type_name,
            id_field,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields a configuration may set
    pub fn settable_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_output_only())
    }

    /// Reject unknown keys, missing required fields, output-only fields
    /// and values of the wrong kind
    pub fn validate(&self, config: &Attributes) -> Result<()> {
        let invalid = |msg: String| Err(Error::validation(self.type_name, msg));

        for (key, value) in config {
            let Some(spec) = self.get(key) else {
                return invalid(format!("unknown field \"{}\"", key));
            };
            if spec.is_output_only() && !value.is_null() {
                return invalid(format!("\"{}\" is computed and cannot be set", key));
            }
            if !spec.kind.accepts(value) {
                return invalid(format!(
                    "\"{}\" must be {}, got {}",
                    key,
                    spec.kind,
                    value.type_name()
                ));
            }
        }

        for spec in self.fields.iter().filter(|f| f.required) {
            if config.get(spec.name).map_or(true, AttrValue::is_unset) {
                return invalid(format!("required field \"{}\" is not set", spec.name));
            }
        }

        Ok(())
    }

    /// Fill declared defaults for fields left unset and normalize set
    /// values to their declared kind
    pub fn apply_defaults(&self, config: &Attributes) -> Attributes {
        let mut out = config.clone();
        for spec in &self.fields {
            match out.remove(spec.name) {
                Some(value) if !value.is_null() => {
                    out.insert(spec.name.to_string(), spec.kind.coerce(value));
                }
                _ => {
                    if let Some(default) = &spec.default {
                        out.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }
        out
    }

    /// Validate, then apply defaults
    pub fn prepare(&self, config: &Attributes) -> Result<Attributes> {
        self.validate(config)?;
        Ok(self.apply_defaults(config))
    }

    /// Identifier of the instance a configuration describes
    pub fn instance_id(&self, config: &Attributes) -> Option<String> {
        config
            .get(self.id_field)
            .and_then(AttrValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Provider request payload: every settable field that is set, under
    /// its API key. Unset optional fields are omitted.
    pub fn to_request(&self, config: &Attributes) -> Value {
        let mut body = Map::new();
        for spec in self.settable_fields() {
            if let Some(value) = config.get(spec.name).filter(|v| !v.is_unset()) {
                body.insert(spec.api_name.to_string(), value.to_json());
            }
        }
        Value::Object(body)
    }

    /// State attributes for every declared field, read from the provider
    /// response under the same API keys `to_request` writes
    pub fn from_response(&self, remote: &Value) -> Attributes {
        self.fields
            .iter()
            .map(|spec| {
                let value = remote
                    .get(spec.api_name)
                    .map(AttrValue::from_json)
                    .unwrap_or(AttrValue::Null);
                (spec.name.to_string(), spec.kind.coerce(value))
            })
            .collect()
    }
}
