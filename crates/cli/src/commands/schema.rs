//! Schema Commands

use anyhow::Result;
use clap::Args;
use gcompute_provider::schema::FieldSpec;
use gcompute_provider::ResourceKind;
use serde::Serialize;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct SchemaArgs {
    /// Resource type to describe; lists all types when omitted
    pub type_name: Option<String>,
}

#[derive(Serialize)]
pub struct ResourceTypeDisplay {
    pub type_name: &'static str,
    pub collection: &'static str,
    pub scope: String,
    pub fields: usize,
}

impl From<ResourceKind> for ResourceTypeDisplay {
    fn from(kind: ResourceKind) -> Self {
        let handler = kind.handler();
        Self {
            type_name: kind.type_name(),
            collection: handler.collection(),
            scope: handler.scope_kind().to_string(),
            fields: handler.descriptor().fields.len(),
        }
    }
}

impl TableDisplay for ResourceTypeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Type", "Collection", "Scope", "Fields"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.type_name.to_string(),
            self.collection.to_string(),
            self.scope.clone(),
            self.fields.to_string(),
        ]
    }
}

#[derive(Serialize)]
pub struct FieldDisplay {
    pub name: &'static str,
    pub api_name: &'static str,
    pub kind: String,
    pub mode: &'static str,
    pub default: String,
    pub force_new: bool,
    pub description: &'static str,
}

impl From<&FieldSpec> for FieldDisplay {
    fn from(spec: &FieldSpec) -> Self {
        let mode = match (spec.required, spec.optional, spec.computed) {
            (true, _, _) => "required",
            (_, true, true) => "optional+computed",
            (_, true, false) => "optional",
            _ => "computed",
        };
        Self {
            name: spec.name,
            api_name: spec.api_name,
            kind: spec.kind.to_string(),
            mode,
            default: spec.default.as_ref().map(|d| d.render()).unwrap_or_default(),
            force_new: spec.force_new,
            description: spec.description,
        }
    }
}

impl TableDisplay for FieldDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Field", "API Key", "Type", "Mode", "Default", "Force New", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.to_string(),
            self.api_name.to_string(),
            self.kind.clone(),
            self.mode.to_string(),
            self.default.clone(),
            if self.force_new { "✓".to_string() } else { String::new() },
            self.description.to_string(),
        ]
    }
}

pub fn execute(args: SchemaArgs, format: OutputFormat) -> Result<()> {
    match args.type_name {
        None => {
            let types: Vec<ResourceTypeDisplay> = ResourceKind::ALL.into_iter().map(ResourceTypeDisplay::from).collect();
            print_list(&types, format);
        }
        Some(type_name) => {
            let kind: ResourceKind = type_name.parse()?;
            let fields: Vec<FieldDisplay> = kind.handler().descriptor().fields.iter().map(FieldDisplay::from).collect();
            print_list(&fields, format);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_modes() {
        let descriptor = ResourceKind::Disk.handler().descriptor();
        let modes: Vec<(&str, &str)> = descriptor
            .fields
            .iter()
            .map(FieldDisplay::from)
            .map(|f| (f.name, f.mode))
            .collect();
        assert!(modes.contains(&("name", "required")));
        assert!(modes.contains(&("size_gb", "optional+computed")));
        assert!(modes.contains(&("self_link", "computed")));
    }

    #[test]
    fn test_type_listing() {
        let row = ResourceTypeDisplay::from(ResourceKind::TargetPool).row();
        assert_eq!(row[0], "google_compute_target_pool");
        assert_eq!(row[2], "regional");
    }
}
