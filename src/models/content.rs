//! Pure content rendering: event-type templates, attachment blocks and
//! truncation. No I/O; everything here is a function of its inputs.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::models::message::Priority;
use crate::models::routing::priority_color;
use crate::models::slack::{Attachment, AttachmentField};

pub const ELLIPSIS: &str = "...";

type Payload = HashMap<String, JsonValue>;

/// String accessor that degrades to a placeholder instead of failing when a
/// key is missing or mis-typed.
fn field_str<'a>(payload: &'a Payload, key: &str, fallback: &'a str) -> &'a str {
    payload.get(key).and_then(|v| v.as_str()).unwrap_or(fallback)
}

fn field_display(payload: &Payload, key: &str, fallback: &str) -> String {
    match payload.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        _ => fallback.to_string(),
    }
}

/// Select a template by event type and interpolate payload fields. Absent
/// fields fall back to generic phrasing; this never errors.
pub fn render_content(event_type: &str, payload: &Payload) -> String {
    match event_type {
        "inquiry-business" => {
            let entity = field_str(payload, "entity_id", "an unidentified business");
            let contact = field_str(payload, "contact", "no contact provided");
            format!(
                "New business inquiry for {} ({})",
                entity, contact
            )
        }
        "inquiry-media" => {
            let outlet = field_str(payload, "outlet", "an unnamed outlet");
            let topic = field_str(payload, "topic", "an unspecified topic");
            format!("Media inquiry from {} about {}", outlet, topic)
        }
        "inquiry-general" => {
            let subject = field_str(payload, "subject", "no subject");
            format!("General inquiry received: {}", subject)
        }
        "system-error" => {
            let component = field_str(payload, "component", "unknown component");
            let detail = field_str(payload, "detail", "no detail supplied");
            format!("System error in {}: {}", component, detail)
        }
        "system-warning" => {
            let component = field_str(payload, "component", "unknown component");
            let detail = field_str(payload, "detail", "no detail supplied");
            format!("Warning from {}: {}", component, detail)
        }
        "deployment-completed" => {
            let service = field_str(payload, "service", "a service");
            let version = field_display(payload, "version", "an unversioned build");
            format!("Deployment completed: {} now running {}", service, version)
        }
        "subscriber-signup" => {
            let plan = field_str(payload, "plan", "an unspecified plan");
            format!("New subscriber signed up on {}", plan)
        }
        "payment-received" => {
            let amount = field_display(payload, "amount", "an unspecified amount");
            let currency = field_str(payload, "currency", "");
            if currency.is_empty() {
                format!("Payment received: {}", amount)
            } else {
                format!("Payment received: {} {}", amount, currency)
            }
        }
        other => {
            let detail = field_str(payload, "detail", "");
            if detail.is_empty() {
                format!("Event received: {}", other)
            } else {
                format!("Event received: {} ({})", other, detail)
            }
        }
    }
}

/// Build the structured attachment block for a request: title, color from
/// the priority table, and the payload's scalar fields as short fields.
pub fn render_attachment(event_type: &str, payload: &Payload, priority: Priority) -> Attachment {
    let mut fields: Vec<AttachmentField> = payload
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(AttachmentField {
                title: key.clone(),
                value: rendered,
                short: true,
            })
        })
        .collect();
    fields.sort_by(|a, b| a.title.cmp(&b.title));

    fields.push(AttachmentField {
        title: "priority".to_string(),
        value: priority.as_str().to_string(),
        short: true,
    });

    Attachment {
        title: event_title(event_type),
        color: priority_color(priority).to_string(),
        fields,
    }
}

fn event_title(event_type: &str) -> String {
    match event_type {
        "inquiry-business" => "Business Inquiry".to_string(),
        "inquiry-media" => "Media Inquiry".to_string(),
        "inquiry-general" => "General Inquiry".to_string(),
        "system-error" => "System Error".to_string(),
        "system-warning" => "System Warning".to_string(),
        "deployment-completed" => "Deployment Completed".to_string(),
        "subscriber-signup" => "Subscriber Signup".to_string(),
        "payment-received" => "Payment Received".to_string(),
        other => format!("Event: {}", other),
    }
}

/// Cut `text` to at most `max_len` characters, preferring the last
/// whitespace boundary so words stay whole, and append an ellipsis marker.
/// Idempotent: anything already within the limit comes back unchanged.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    if max_len <= ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }

    let budget = max_len - ELLIPSIS.len();
    let head: String = text.chars().take(budget).collect();

    match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => format!("{}{}", head[..idx].trim_end(), ELLIPSIS),
        _ => format!("{}{}", head, ELLIPSIS),
    }
}
