//! Terminal output formatting.

use colored::Colorize;
use tabled::{Table, Tabled};

use crate::provider::FunctionDescription;
use crate::release::{ReleaseReport, RouteOutcome};
use crate::stack::{ChangeSetPreview, StackOutcome};

use super::commands::OutputFormat;

/// Renders command results as text or JSON.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Selected output format.
    format: OutputFormat,
}

/// One row of the show-service table.
#[derive(Tabled)]
struct AttributeRow {
    /// Attribute name.
    #[tabled(rename = "Attribute")]
    attribute: String,
    /// Attribute value.
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders the outcome of an infrastructure reconcile.
    #[must_use]
    pub fn format_stack_outcome(&self, stack_name: &str, outcome: &StackOutcome) -> String {
        let verb = match outcome {
            StackOutcome::Preview(preview) => return self.format_preview(preview),
            StackOutcome::Created => "created",
            StackOutcome::Updated => "updated",
            StackOutcome::NoChanges => "unchanged (no updates to perform)",
            StackOutcome::Recreated => "recreated",
        };
        match self.format {
            OutputFormat::Text => format!("Stack {}: {}", stack_name.bold(), verb.green()),
            OutputFormat::Json => serde_json::json!({
                "stack": stack_name,
                "outcome": verb,
            })
            .to_string(),
        }
    }

    /// Renders a dry-run preview.
    #[must_use]
    pub fn format_preview(&self, preview: &ChangeSetPreview) -> String {
        match self.format {
            OutputFormat::Text => {
                let mut out = String::new();
                out.push_str(&format!("{}\n", "Resource Changes:".bold()));
                out.push_str(&preview.resource_changes);
                out.push_str(&format!("\n\n{}\n", "Parameter Changes:".bold()));
                out.push_str(&preview.parameter_diff);
                out.push_str(&format!("\n\n{}\n", "Tag Changes:".bold()));
                out.push_str(&preview.tag_diff);
                out.push_str(&format!("\n\n{}\n", "Template Changes:".bold()));
                out.push_str(&preview.template_diff);
                out
            }
            OutputFormat::Json => serde_json::json!({
                "resource_changes": preview.resource_changes,
                "parameter_diff": preview.parameter_diff,
                "tag_diff": preview.tag_diff,
                "template_diff": preview.template_diff,
            })
            .to_string(),
        }
    }

    /// Renders a release report.
    #[must_use]
    pub fn format_release(&self, report: &ReleaseReport) -> String {
        let route_line = report.route.as_ref().map(route_summary);
        match self.format {
            OutputFormat::Text => {
                let mut out = format!(
                    "Released {} version {} to stage \"{}\" ({} parameters \
                     snapshotted)",
                    report.function_name.bold(),
                    report.version.to_string().green(),
                    report.alias,
                    report.parameters_copied,
                );
                if let Some(line) = route_line {
                    out.push('\n');
                    out.push_str(&line);
                }
                out
            }
            OutputFormat::Json => serde_json::json!({
                "function": report.function_name,
                "version": report.version,
                "alias": report.alias,
                "parameters_copied": report.parameters_copied,
                "route": route_line,
            })
            .to_string(),
        }
    }

    /// Renders a function configuration as a table.
    #[must_use]
    pub fn format_function(&self, description: &FunctionDescription) -> String {
        match self.format {
            OutputFormat::Text => {
                let mut rows = vec![AttributeRow {
                    attribute: String::from("Name"),
                    value: description.name.clone(),
                }];
                let optional = [
                    ("Version", description.version.clone()),
                    ("Runtime", description.runtime.clone()),
                    ("Description", description.description.clone()),
                    ("MemoryMb", description.memory_mb.map(|m| m.to_string())),
                    ("TimeoutSecs", description.timeout_secs.map(|t| t.to_string())),
                ];
                for (attribute, value) in optional {
                    if let Some(value) = value {
                        rows.push(AttributeRow {
                            attribute: attribute.to_string(),
                            value,
                        });
                    }
                }
                for (key, value) in &description.environment {
                    rows.push(AttributeRow {
                        attribute: key.clone(),
                        value: value.clone(),
                    });
                }
                Table::new(rows).to_string()
            }
            OutputFormat::Json => serde_json::json!({
                "name": description.name,
                "version": description.version,
                "runtime": description.runtime,
                "description": description.description,
                "memory_mb": description.memory_mb,
                "timeout_secs": description.timeout_secs,
                "environment": description.environment,
            })
            .to_string(),
        }
    }
}

/// One-line summary of a routing outcome.
fn route_summary(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::SkippedNoDomain => {
            String::from("Route mapping: skipped (no custom domain configured)")
        }
        RouteOutcome::Created => String::from("Route mapping: created"),
        RouteOutcome::AlreadyCorrect => String::from("Route mapping: already in place"),
        RouteOutcome::ManualInterventionRequired { existing } => format!(
            "Route mapping: points at {}:{} and cannot be updated via the \
             API; fix it in the provider console",
            existing.backend_id, existing.stage
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_release_json_output_is_parseable() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let report = ReleaseReport {
            function_name: String::from("billing-api"),
            version: 3,
            alias: String::from("dev"),
            parameters_copied: 2,
            route: Some(RouteOutcome::AlreadyCorrect),
        };

        let rendered = formatter.format_release(&report);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["alias"], "dev");
    }

    #[test]
    fn test_function_table_lists_environment() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let description = FunctionDescription {
            name: String::from("billing-api"),
            version: Some(String::from("3")),
            runtime: Some(String::from("python3.12")),
            memory_mb: Some(256),
            timeout_secs: Some(30),
            description: None,
            environment: BTreeMap::from([(
                String::from("SSM_CONFIG_VERSION"),
                String::from("/billing/dev/3/"),
            )]),
        };

        let table = formatter.format_function(&description);
        assert!(table.contains("billing-api"));
        assert!(table.contains("SSM_CONFIG_VERSION"));
        assert!(table.contains("/billing/dev/3/"));
    }
}
