//! Resource Commands
//!
//! Configuration is read from a JSON object of field values. State lives in
//! a JSON state file that every mutating command rewrites, including after
//! a failure, so an interrupted change is never forgotten.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use gcompute_common::{AttrValue, Attributes};
use gcompute_provider::lifecycle::{AttributeChange, Plan, PlanAction};
use gcompute_provider::state::{decode_config, decode_state, encode_state};
use gcompute_provider::ResourceState;
use serde::Serialize;

use super::Session;
use crate::output::{
    print_diagnostics, print_info, print_list, print_success, print_warning, OutputFormat, TableDisplay,
};

#[derive(Args)]
pub struct ValidateArgs {
    /// Resource type, e.g. google_compute_http_health_check
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// Resource configuration file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct ChangeArgs {
    /// Resource type
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// Resource configuration file (JSON)
    #[arg(short, long, required_unless_present = "destroy")]
    pub config: Option<PathBuf>,

    /// State file; created if missing
    #[arg(short, long)]
    pub state: PathBuf,

    /// Plan removal of the resource instead
    #[arg(long, conflicts_with = "config")]
    pub destroy: bool,
}

#[derive(Args)]
pub struct StateArgs {
    /// Resource type
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// State file
    #[arg(short, long)]
    pub state: PathBuf,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Resource type
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// Identifier (name) of the existing entity
    pub id: String,

    /// State file to write
    #[arg(short, long)]
    pub state: PathBuf,
}

/// One attribute of a resource state
#[derive(Serialize)]
pub struct AttributeDisplay {
    pub attribute: String,
    pub value: String,
}

impl TableDisplay for AttributeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Attribute", "Value"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.attribute.clone(), self.value.clone()]
    }
}

#[derive(Serialize)]
pub struct ChangeDisplay {
    pub field: String,
    pub before: String,
    pub after: String,
    pub force_new: bool,
}

impl From<&AttributeChange> for ChangeDisplay {
    fn from(change: &AttributeChange) -> Self {
        let render = |v: &AttrValue| if v.is_unset() { "(unset)".to_string() } else { v.render() };
        Self {
            field: change.field.clone(),
            before: render(&change.before),
            after: render(&change.after),
            force_new: change.force_new,
        }
    }
}

impl TableDisplay for ChangeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Field", "Before", "After", "Forces Replacement"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.field.clone(),
            self.before.clone(),
            self.after.clone(),
            if self.force_new { "✓".to_string() } else { String::new() },
        ]
    }
}

fn read_config(path: &Path) -> Result<Attributes> {
    let data = std::fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    decode_config(&data).with_context(|| format!("parsing config {}", path.display()))
}

/// A missing state file is an absent resource
fn read_state(path: &Path) -> Result<ResourceState> {
    if !path.exists() {
        return Ok(ResourceState::absent());
    }
    let data = std::fs::read(path).with_context(|| format!("reading state {}", path.display()))?;
    decode_state(&data).with_context(|| format!("parsing state {}", path.display()))
}

fn write_state(path: &Path, state: &ResourceState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode_state(state)?).with_context(|| format!("writing state {}", path.display()))
}

fn print_state(state: &ResourceState, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(state).unwrap_or_default());
        return;
    }
    print_info(&format!("id: {}  phase: {}", state.id().unwrap_or("-"), state.phase));
    let rows: Vec<AttributeDisplay> = state
        .attributes
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| AttributeDisplay {
            attribute: k.clone(),
            value: v.render(),
        })
        .collect();
    print_list(&rows, format);
}

fn print_plan(type_name: &str, id: Option<&str>, plan: &Plan, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(plan).unwrap_or_default());
        return;
    }
    let action = match plan.action {
        PlanAction::NoOp => "no changes".dimmed(),
        PlanAction::Create => "+ create".green(),
        PlanAction::Update => "~ update in place".yellow(),
        PlanAction::Replace => "-/+ replace".red(),
        PlanAction::Delete => "- destroy".red(),
    };
    println!("{}.{}: {}", type_name, id.unwrap_or("(new)"), action.bold());
    if !plan.changes.is_empty() {
        let changes: Vec<ChangeDisplay> = plan.changes.iter().map(ChangeDisplay::from).collect();
        print_list(&changes, format);
    }
}

fn desired_config(args: &ChangeArgs) -> Result<Option<Attributes>> {
    match (&args.config, args.destroy) {
        (_, true) => Ok(None),
        (Some(path), false) => read_config(path).map(Some),
        (None, false) => bail!("--config is required unless --destroy is given"),
    }
}

pub fn validate(session: &Session, args: ValidateArgs) -> Result<()> {
    let config = read_config(&args.config)?;
    let diagnostics = session.provider.validate_resource_config(&args.type_name, &config);
    if print_diagnostics(&diagnostics) {
        bail!("configuration for {} is invalid", args.type_name);
    }
    print_success(&format!("Configuration for {} is valid", args.type_name));
    Ok(())
}

pub fn plan(session: &Session, args: ChangeArgs, format: OutputFormat) -> Result<()> {
    let prior = read_state(&args.state)?;
    let config = desired_config(&args)?;

    let response = session
        .provider
        .plan_resource_change(&args.type_name, &prior, config.as_ref());
    if print_diagnostics(&response.diagnostics) {
        bail!("planning {} failed", args.type_name);
    }
    if let Some(plan) = &response.plan {
        print_plan(&args.type_name, prior.id(), plan, format);
    }
    Ok(())
}

pub async fn apply(session: &Session, args: ChangeArgs, format: OutputFormat) -> Result<()> {
    let prior = read_state(&args.state)?;
    let config = desired_config(&args)?;

    let response = session
        .provider
        .apply_resource_change(&args.type_name, prior, config.as_ref())
        .await;
    write_state(&args.state, &response.new_state)?;

    if print_diagnostics(&response.diagnostics) {
        if !response.new_state.phase.is_settled() {
            print_warning(&format!(
                "{} is {}; run `gcompute read` before changing it again",
                args.type_name, response.new_state.phase
            ));
        }
        bail!("applying {} failed; state written to {}", args.type_name, args.state.display());
    }
    if let Some(plan) = &response.plan {
        print_plan(&args.type_name, response.new_state.id(), plan, format);
    }
    print_success(&format!("State written to {}", args.state.display()));
    Ok(())
}

pub async fn read(session: &Session, args: StateArgs, format: OutputFormat) -> Result<()> {
    let current = read_state(&args.state)?;
    let response = session.provider.read_resource(&args.type_name, current).await;
    write_state(&args.state, &response.new_state)?;

    if print_diagnostics(&response.diagnostics) {
        bail!("reading {} failed", args.type_name);
    }
    print_state(&response.new_state, format);
    Ok(())
}

pub async fn destroy(session: &Session, args: StateArgs) -> Result<()> {
    let prior = read_state(&args.state)?;
    let id = prior.id().map(str::to_string);

    let response = session
        .provider
        .apply_resource_change(&args.type_name, prior, None)
        .await;
    write_state(&args.state, &response.new_state)?;

    if print_diagnostics(&response.diagnostics) {
        bail!("destroying {} failed", args.type_name);
    }
    match id {
        Some(id) => print_success(&format!("{}.{} destroyed", args.type_name, id)),
        None => print_info("Nothing to destroy"),
    }
    Ok(())
}

pub async fn import(session: &Session, args: ImportArgs, format: OutputFormat) -> Result<()> {
    let existing = read_state(&args.state)?;
    if existing.exists() {
        bail!(
            "{} already tracks {}; refusing to overwrite",
            args.state.display(),
            existing.id().unwrap_or_default()
        );
    }

    let response = session.provider.import_resource_state(&args.type_name, &args.id).await;
    if print_diagnostics(&response.diagnostics) {
        bail!("importing {} {} failed", args.type_name, args.id);
    }
    if let Some(state) = response.imported {
        write_state(&args.state, &state)?;
        print_state(&state, format);
    }
    Ok(())
}
