//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use backoffice_api_models::{Message, ModelInstance, MultipleActionResult, ReportItem, SearchResults};
use backoffice_client::ViewContent;
use backoffice_client::report::{ActionOutcome, ReportListState};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn print_messages(messages: &[Message]) {
    for message in messages {
        eprintln!("[{}] {}", message.category().as_str(), message.message);
    }
}

pub(crate) fn render_view(content: &ViewContent, format: OutputFormat) -> CliResult<()> {
    match content {
        ViewContent::Pending => Ok(()),
        ViewContent::Rendered(payload) => match format {
            OutputFormat::Json => print_json(payload),
            OutputFormat::Table => {
                println!("{}", payload.content);
                Ok(())
            }
        },
        ViewContent::Failed(failure) => {
            let status = failure
                .status
                .map_or_else(|| "no response".to_string(), |status| format!("status {status}"));
            Err(CliError::failure(anyhow!(
                "view failed to load ({status}): {}",
                failure.message.trim()
            )))
        }
    }
}

pub(crate) fn render_value(value: &Value, format: OutputFormat) -> CliResult<()> {
    match (format, value) {
        (OutputFormat::Table, Value::String(text)) => {
            println!("{text}");
            Ok(())
        }
        (OutputFormat::Table, Value::Null) => Ok(()),
        _ => print_json(value),
    }
}

pub(crate) fn render_report(state: &ReportListState, format: OutputFormat) -> CliResult<()> {
    let Some(report) = state.report() else {
        return Ok(());
    };
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!("{:<12} {:<3} FIELDS", "ID", "EXP");
            for item in &report.items {
                println!(
                    "{:<12} {:<3} {}",
                    item.item_id,
                    if item.expanded { "+" } else { "" },
                    format_fields(item)
                );
                if item.expanded && !item.actions.is_empty() {
                    let methods: Vec<&str> = item
                        .actions
                        .iter()
                        .map(|action| action.method.as_str())
                        .collect();
                    println!("{:<16} actions: {}", "", methods.join(", "));
                }
            }
            println!(
                "page {}/{} ({} items)",
                state.page(),
                report.page_count(),
                report.item_count
            );
            if let Some((field, ascending)) = state.query().order_field() {
                println!(
                    "order: {field} {}",
                    if ascending { "ascending" } else { "descending" }
                );
            }
            if !report.multiple_action_list.is_empty() {
                let methods: Vec<&str> = report
                    .multiple_action_list
                    .iter()
                    .map(|action| action.method.as_str())
                    .collect();
                println!("bulk actions: {}", methods.join(", "));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_action_outcome(outcome: &ActionOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&outcome_json(outcome)),
        OutputFormat::Table => {
            match outcome {
                ActionOutcome::Navigate(url) => println!("{url}"),
                ActionOutcome::OpenForm(action) => {
                    println!("{}", action.form_markup().unwrap_or_default());
                }
                ActionOutcome::AwaitingConfirmation(prompt) => println!("{prompt}"),
                ActionOutcome::Updated(item_id) => println!("updated {item_id}"),
                ActionOutcome::Removed(item_id) => println!("removed {item_id}"),
                ActionOutcome::Detail { content, .. } => {
                    let text = content
                        .get("content")
                        .and_then(Value::as_str)
                        .map_or_else(|| content.to_string(), str::to_string);
                    println!("{text}");
                }
                ActionOutcome::FormErrors { form, .. } => {
                    println!("{}", form.as_deref().unwrap_or_default());
                }
            }
            Ok(())
        }
    }
}

pub(crate) fn render_bulk_result(result: &MultipleActionResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            println!(
                "succeeded: {}, failed: {}",
                result.succeeded_count(),
                result.failed_count()
            );
            for (item_id, reason) in &result.failed {
                println!("  {item_id}: {}", reason.as_deref().unwrap_or("failed"));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_model(instance: &ModelInstance, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(instance),
        OutputFormat::Table => {
            println!("{} {}: {}", instance.model, instance.id, instance.title);
            if let Some(Value::Object(tabs)) = instance.extra.get("tabs") {
                let names: Vec<&str> = tabs.keys().map(String::as_str).collect();
                println!("tabs: {}", names.join(", "));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_search(results: &SearchResults, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Table => {
            println!("{:<16} {:<12} TITLE", "MODEL", "ID");
            for hit in &results.results {
                println!("{:<16} {:<12} {}", hit.model, hit.id, hit.title);
            }
            let counts: Vec<String> = results
                .model_counts
                .iter()
                .map(|count| format!("{}={}", count.meta.slug, count.count))
                .collect();
            println!("{} hits for '{}' ({})", results.total(), results.query, counts.join(", "));
            Ok(())
        }
    }
}

fn outcome_json(outcome: &ActionOutcome) -> Value {
    match outcome {
        ActionOutcome::Navigate(url) => json!({"outcome": "navigate", "url": url.as_str()}),
        ActionOutcome::OpenForm(action) => {
            json!({"outcome": "open_form", "method": action.method, "form": action.form})
        }
        ActionOutcome::AwaitingConfirmation(prompt) => {
            json!({"outcome": "awaiting_confirmation", "prompt": prompt})
        }
        ActionOutcome::Updated(item_id) => json!({"outcome": "updated", "item_id": item_id}),
        ActionOutcome::Removed(item_id) => json!({"outcome": "removed", "item_id": item_id}),
        ActionOutcome::Detail { action, content } => {
            json!({"outcome": "detail", "method": action.method, "content": content})
        }
        ActionOutcome::FormErrors { action, form } => {
            json!({"outcome": "form_errors", "method": action.method, "form": form})
        }
    }
}

pub(crate) fn format_fields(item: &ReportItem) -> String {
    item.fields
        .iter()
        .map(|(key, value)| format!("{key}={}", format_value(value)))
        .collect::<Vec<_>>()
        .join("  ")
}

pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_api_models::ItemId;

    #[test]
    fn values_render_without_json_quoting() {
        assert_eq!(format_value(&json!("open")), "open");
        assert_eq!(format_value(&json!(null)), "-");
        assert_eq!(format_value(&json!(12)), "12");
    }

    #[test]
    fn fields_are_listed_in_key_order() {
        let mut item = ReportItem::new("1");
        item.fields.insert("status".into(), json!("open"));
        item.fields.insert("amount".into(), json!(10));
        assert_eq!(format_fields(&item), "amount=10  status=open");
    }

    #[test]
    fn outcomes_serialize_with_a_tag() {
        let value = outcome_json(&ActionOutcome::Removed(ItemId::from("4")));
        assert_eq!(value, json!({"outcome": "removed", "item_id": "4"}));
    }
}
