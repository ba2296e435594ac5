use scanreturn_core::{ActivationOutcome, MessagingService, Suggestions, TagRecord, TagView};
use serde_json::{Value, json};

pub async fn record_json(
    record: &TagRecord,
    messaging: &MessagingService,
    suggestions: &Suggestions,
) -> Value {
    let contact_link = if record.is_active() {
        let message = suggestions.finder_message(record.item_name()).await;
        messaging.contact_link(record, &message)
    } else {
        None
    };
    json!({
        "tag_id": record.tag_id(),
        "status": record.status().as_str(),
        "item_name": record.item_name(),
        "owner_contact": record.owner_contact(),
        "contact_link": contact_link,
    })
}

pub async fn view_json(
    view: &TagView,
    messaging: &MessagingService,
    suggestions: &Suggestions,
) -> Value {
    let mut value = json!({
        "view": view.label(),
        "tag_id": view.tag_id(),
    });
    match view {
        TagView::Activating { record, last_error } => {
            value["record"] = record_json(record, messaging, suggestions).await;
            value["last_error"] = json!(last_error);
        }
        TagView::Found { record } => {
            value["record"] = record_json(record, messaging, suggestions).await;
        }
        TagView::Error { message, .. } => {
            value["message"] = json!(message);
            value["recovery"] = json!("return_home");
        }
        TagView::Landing | TagView::Resolving { .. } | TagView::ActivationSubmitted { .. } => {}
    }
    value
}

pub fn outcome_json(outcome: &ActivationOutcome) -> Value {
    let mut value = json!({
        "outcome": outcome.as_str(),
        "succeeded": outcome.succeeded(),
    });
    if let ActivationOutcome::Failed { message } = outcome {
        value["message"] = json!(message);
    }
    value
}

/// One human-readable line per field, skipping absent ones.
pub fn print_fields(value: &Value, indent: usize) {
    let Some(fields) = value.as_object() else {
        return;
    };
    let pad = " ".repeat(indent);
    for (key, field) in fields {
        match field {
            Value::Null => {}
            Value::Object(_) => {
                println!("{pad}{key}:");
                print_fields(field, indent + 2);
            }
            Value::String(text) => println!("{pad}{key}: {text}"),
            other => println!("{pad}{key}: {other}"),
        }
    }
}

pub fn print_value(value: &Value, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print_fields(value, 0);
    }
    Ok(())
}
