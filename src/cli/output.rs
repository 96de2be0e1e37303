//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::{ApplyOutcome, PlanAction, ResourcePlan};
use crate::provider::{ProviderRegistry, ResourceDefinition};
use crate::schema::{AttributeSchema, Element, ResourceSchema};
use crate::state::InstanceState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource type row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Type")]
    name: String,
    #[tabled(rename = "API")]
    api_level: String,
    #[tabled(rename = "Attributes")]
    attributes: usize,
    #[tabled(rename = "Update")]
    update: String,
}

/// Attribute row for table display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    path: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Force new")]
    force_new: String,
    #[tabled(rename = "Default")]
    default: String,
}

/// Attribute change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Attribute")]
    path: String,
    #[tabled(rename = "Old")]
    old: String,
    #[tabled(rename = "New")]
    new: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the registered resource types.
    #[must_use]
    pub fn format_resources(&self, registry: &ProviderRegistry) -> String {
        match self.format {
            OutputFormat::Json => {
                let types: Vec<ResourceJson> = registry
                    .iter()
                    .map(|(name, def)| ResourceJson::new(name, def))
                    .collect();
                serde_json::to_string_pretty(&types).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<ResourceRow> = registry
                    .iter()
                    .map(|(name, def)| ResourceRow {
                        name: name.to_string(),
                        api_level: def
                            .api_level
                            .map_or_else(|| String::from("-"), |level| level.to_string()),
                        attributes: def.schema.attributes().count(),
                        update: yes_no(def.supports_update()),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats the attribute schema of one resource type.
    #[must_use]
    pub fn format_schema(&self, name: &str, definition: &ResourceDefinition) -> String {
        let mut rows = Vec::new();
        schema_rows(&definition.schema, "", &mut rows);
        match self.format {
            OutputFormat::Json => {
                let attributes: Vec<AttributeJson> = rows
                    .into_iter()
                    .map(|r| AttributeJson {
                        path: r.path,
                        kind: r.kind,
                        mode: r.mode,
                        force_new: r.force_new == "yes",
                        default: (r.default != "-").then_some(r.default),
                    })
                    .collect();
                serde_json::to_string_pretty(&SchemaJson {
                    resource_type: name.to_string(),
                    attributes,
                })
                .unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n{}\n", name.bold());
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats a plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ResourcePlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ResourcePlan) -> String {
        if plan.is_noop() {
            return format!(
                "{} No changes required - {} is up to date.\n",
                "✓".green(),
                plan.resource_type
            );
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "\n{} {} {}",
            Self::format_action(plan.action),
            plan.resource_type,
            plan.id.as_deref().unwrap_or("(new)")
        );

        if !plan.changes.is_empty() {
            let rows: Vec<ChangeRow> = plan
                .changes
                .iter()
                .map(|c| ChangeRow {
                    path: c.path.clone(),
                    old: Self::truncate(&c.old.to_string(), 40),
                    new: Self::truncate(&c.new.to_string(), 40),
                    note: if c.forces_new {
                        String::from("forces replacement")
                    } else {
                        String::new()
                    },
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }
        output
    }

    /// Formats the result of an apply or destroy.
    #[must_use]
    pub fn format_outcome(&self, outcome: &ApplyOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&OutcomeJson {
                plan: PlanJson::from(&outcome.plan),
                state: outcome.state.as_ref().map(StateJson::from),
                error: outcome.error.as_ref().map(ToString::to_string),
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                match &outcome.error {
                    None => {
                        let _ = writeln!(
                            output,
                            "{} {} {}",
                            "✓".green(),
                            outcome.plan.resource_type,
                            Self::past_tense(outcome.plan.action)
                        );
                    }
                    Some(e) => {
                        let _ = writeln!(
                            output,
                            "{} {} failed: {e}",
                            "✗".red(),
                            outcome.plan.resource_type
                        );
                        if outcome.state.is_some() {
                            let _ = writeln!(output, "   Partial state was saved.");
                        }
                    }
                }
                if let Some(state) = &outcome.state {
                    output.push_str(&Self::format_state_text(state));
                }
                output
            }
        }
    }

    /// Formats persisted state.
    #[must_use]
    pub fn format_state(&self, state: Option<&InstanceState>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&state.map(StateJson::from)).unwrap_or_default()
            }
            OutputFormat::Text => state.map_or_else(
                || format!("{} Resource no longer exists.\n", "⚠".yellow()),
                Self::format_state_text,
            ),
        }
    }

    fn format_state_text(state: &InstanceState) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "\n{} {}", state.resource_type.bold(), state.id);
        for (key, value) in &state.attributes {
            let _ = writeln!(output, "   {key} = {}", Self::truncate(value, 60));
        }
        output
    }

    fn format_action(action: PlanAction) -> String {
        match action {
            PlanAction::Create => "+ create".green().to_string(),
            PlanAction::Update => "~ update".yellow().to_string(),
            PlanAction::Replace => "-/+ replace".red().to_string(),
            PlanAction::Delete => "- delete".red().to_string(),
            PlanAction::NoOp => "  no change".dimmed().to_string(),
        }
    }

    const fn past_tense(action: PlanAction) -> &'static str {
        match action {
            PlanAction::Create => "created",
            PlanAction::Update => "updated",
            PlanAction::Replace => "replaced",
            PlanAction::Delete => "deleted",
            PlanAction::NoOp => "unchanged",
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

fn yes_no(flag: bool) -> String {
    String::from(if flag { "yes" } else { "no" })
}

/// Flattens a schema into rows, descending into nested blocks.
fn schema_rows(schema: &ResourceSchema, prefix: &str, rows: &mut Vec<AttributeRow>) {
    for (name, attr) in schema.attributes() {
        let path = format!("{prefix}{name}");
        rows.push(AttributeRow {
            path: path.clone(),
            kind: kind_label(attr),
            mode: attr.mode.name().to_string(),
            force_new: yes_no(attr.force_new),
            default: attr
                .default
                .as_ref()
                .map_or_else(|| String::from("-"), ToString::to_string),
        });
        if let Some(Element::Block(block)) = attr.elem.as_deref() {
            schema_rows(block, &format!("{path}.N."), rows);
        }
    }
}

fn kind_label(attr: &AttributeSchema) -> String {
    match attr.elem.as_deref() {
        Some(Element::Block(_)) => format!("{} of blocks", attr.kind.name()),
        Some(Element::Scalar(elem)) => format!("{} of {}", attr.kind.name(), elem.kind.name()),
        None => attr.kind.name().to_string(),
    }
}

// JSON output structures

#[derive(Serialize)]
struct ResourceJson {
    name: String,
    api_level: Option<String>,
    attributes: usize,
    supports_update: bool,
}

impl ResourceJson {
    fn new(name: &str, def: &ResourceDefinition) -> Self {
        Self {
            name: name.to_string(),
            api_level: def.api_level.map(|l| l.to_string()),
            attributes: def.schema.attributes().count(),
            supports_update: def.supports_update(),
        }
    }
}

#[derive(Serialize)]
struct SchemaJson {
    resource_type: String,
    attributes: Vec<AttributeJson>,
}

#[derive(Serialize)]
struct AttributeJson {
    path: String,
    kind: String,
    mode: String,
    force_new: bool,
    default: Option<String>,
}

#[derive(Serialize)]
struct PlanJson {
    resource_type: String,
    id: Option<String>,
    action: String,
    changes: Vec<ChangeJson>,
}

#[derive(Serialize)]
struct ChangeJson {
    path: String,
    old: serde_json::Value,
    new: serde_json::Value,
    forces_new: bool,
}

impl From<&ResourcePlan> for PlanJson {
    fn from(plan: &ResourcePlan) -> Self {
        Self {
            resource_type: plan.resource_type.clone(),
            id: plan.id.clone(),
            action: plan.action.to_string(),
            changes: plan
                .changes
                .iter()
                .map(|c| ChangeJson {
                    path: c.path.clone(),
                    old: c.old.to_json(),
                    new: c.new.to_json(),
                    forces_new: c.forces_new,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct StateJson {
    resource_type: String,
    id: String,
    digest: String,
    attributes: std::collections::BTreeMap<String, String>,
}

impl From<&InstanceState> for StateJson {
    fn from(state: &InstanceState) -> Self {
        Self {
            resource_type: state.resource_type.clone(),
            id: state.id.clone(),
            digest: state.digest(),
            attributes: state.attributes.clone(),
        }
    }
}

#[derive(Serialize)]
struct OutcomeJson {
    plan: PlanJson,
    state: Option<StateJson>,
    error: Option<String>,
}
