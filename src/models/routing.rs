use crate::models::message::Priority;

/// Default destination when an event type has no routing entry or every
/// configured channel turned out invalid.
pub const DEFAULT_CHANNEL: &str = "#general";

/// Event-type → destination-channels table. Order matters only for
/// deterministic logging.
pub fn resolve_channels(event_type: &str) -> Vec<&'static str> {
    match event_type {
        "inquiry-business" => vec!["#inquiries", "#business"],
        "inquiry-media" => vec!["#inquiries", "#media"],
        "inquiry-general" => vec!["#inquiries"],
        "system-error" => vec!["#alerts-critical", "#engineering"],
        "system-warning" => vec!["#engineering"],
        "deployment-completed" => vec!["#deployments"],
        "subscriber-signup" => vec!["#growth"],
        "payment-received" => vec!["#finance"],
        _ => vec![DEFAULT_CHANNEL],
    }
}

/// Whether the routing table has an explicit entry for this event type.
pub fn is_routed_event(event_type: &str) -> bool {
    ROUTED_EVENT_TYPES.contains(&event_type)
}

/// Every event type with an explicit routing entry.
pub const ROUTED_EVENT_TYPES: [&str; 8] = [
    "inquiry-business",
    "inquiry-media",
    "inquiry-general",
    "system-error",
    "system-warning",
    "deployment-completed",
    "subscriber-signup",
    "payment-received",
];

/// Union of every channel referenced by the routing table plus the default
/// channel, for the channel-audit loop.
pub fn audited_channels() -> Vec<&'static str> {
    let mut channels: Vec<&'static str> = Vec::new();
    for event_type in ROUTED_EVENT_TYPES {
        for channel in resolve_channels(event_type) {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
    }
    if !channels.contains(&DEFAULT_CHANNEL) {
        channels.push(DEFAULT_CHANNEL);
    }
    channels
}

/// Priority → attachment color. Unknown priorities take info's color, so the
/// table is total.
pub fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "#dc3545",
        Priority::High => "#fd7e14",
        Priority::Medium => "#ffc107",
        Priority::Low => "#439fe0",
        Priority::Info => "#2eb67d",
    }
}
