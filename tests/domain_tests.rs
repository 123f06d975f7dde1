use std::collections::HashMap;

use alert_service::models::content::{render_attachment, render_content, truncate};
use alert_service::models::message::{NotificationRequest, Priority};
use alert_service::models::routing::{
    DEFAULT_CHANNEL, ROUTED_EVENT_TYPES, audited_channels, priority_color, resolve_channels,
};
use alert_service::models::validation::{is_valid_channel, validate_request};

fn payload(entries: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Test: truncation is idempotent for any input and limit
#[test]
fn test_truncation_is_idempotent() {
    let inputs = [
        "short",
        "This is a long message that needs truncation",
        "word",
        "one two three four five six seven eight nine ten",
        "nowhitespaceatallinthisratherlongstring",
        "",
    ];

    for input in inputs {
        for max_len in [1, 2, 3, 4, 5, 10, 20, 100] {
            let once = truncate(input, max_len);
            let twice = truncate(&once, max_len);
            assert_eq!(
                once, twice,
                "truncate must be idempotent for {:?} at {}",
                input, max_len
            );
            assert!(
                once.chars().count() <= max_len,
                "result {:?} exceeds limit {}",
                once,
                max_len
            );
        }
    }
}

/// Test: truncation cuts at a word boundary and appends an ellipsis
#[test]
fn test_truncation_word_boundary() {
    let result = truncate("This is a long message that needs truncation", 20);

    assert!(result.ends_with("..."), "expected ellipsis, got {:?}", result);
    assert!(result.chars().count() <= 20);
    assert_eq!(result, "This is a long...");
}

/// Test: truncation hard-cuts when no whitespace boundary exists
#[test]
fn test_truncation_without_boundary() {
    let result = truncate("abcdefghijklmnopqrstuvwxyz", 10);

    assert_eq!(result, "abcdefg...");
    assert!(result.chars().count() <= 10);
}

/// Test: human-readable channel names are accepted across the length range
#[test]
fn test_channel_grammar_human_readable() {
    assert!(is_valid_channel("#a"));
    assert!(is_valid_channel("#general"));
    assert!(is_valid_channel("@oncall"));
    assert!(is_valid_channel(&format!("#{}", "x".repeat(79))));

    assert!(!is_valid_channel("#"));
    assert!(!is_valid_channel("@"));
    assert!(!is_valid_channel(&format!("#{}", "x".repeat(80))));
    assert!(!is_valid_channel("general"));
    assert!(!is_valid_channel(""));
}

/// Test: platform identifiers must be 9-11 alphanumerics with a C/D/G prefix
#[test]
fn test_channel_grammar_platform_ids() {
    assert!(is_valid_channel("C024BE91L"));
    assert!(is_valid_channel("D0123456789"));
    assert!(is_valid_channel("G12345678"));

    assert!(!is_valid_channel("C1234567"));
    assert!(!is_valid_channel("C123456789012"));
    assert!(!is_valid_channel("X024BE91L"));
    assert!(!is_valid_channel("C024BE-1L"));
}

/// Test: every routed event type resolves to a non-empty channel list
#[test]
fn test_routing_completeness() {
    for event_type in ROUTED_EVENT_TYPES {
        let channels = resolve_channels(event_type);
        assert!(
            !channels.is_empty(),
            "event type {} resolved to no channels",
            event_type
        );
        for channel in channels {
            assert!(is_valid_channel(channel), "routed channel {} is invalid", channel);
        }
    }
}

/// Test: unknown event types resolve to exactly the default channel
#[test]
fn test_routing_unknown_event_type() {
    assert_eq!(resolve_channels("not-a-real-event"), vec![DEFAULT_CHANNEL]);
    assert_eq!(resolve_channels(""), vec![DEFAULT_CHANNEL]);
}

/// Test: the audit set covers every routed channel plus the default
#[test]
fn test_audited_channels_cover_routing_table() {
    let audited = audited_channels();

    assert!(audited.contains(&DEFAULT_CHANNEL));
    for event_type in ROUTED_EVENT_TYPES {
        for channel in resolve_channels(event_type) {
            assert!(audited.contains(&channel), "{} missing from audit set", channel);
        }
    }

    let mut deduped = audited.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(audited.len(), deduped.len(), "audit set contains duplicates");
}

/// Test: priority colors follow the fixed table
#[test]
fn test_priority_color_table() {
    assert_eq!(priority_color(Priority::Critical), "#dc3545");
    assert_eq!(priority_color(Priority::High), "#fd7e14");
    assert_eq!(priority_color(Priority::Medium), "#ffc107");
    assert_eq!(priority_color(Priority::Low), "#439fe0");
    assert_eq!(priority_color(Priority::Info), "#2eb67d");
}

/// Test: business inquiry content interpolates the entity id and routes to
/// the inquiry channels
#[test]
fn test_business_inquiry_scenario() {
    let payload = payload(&[("entity_id", serde_json::json!("biz-1"))]);

    let content = render_content("inquiry-business", &payload);
    assert!(content.contains("biz-1"), "content {:?} missing entity id", content);

    assert_eq!(
        resolve_channels("inquiry-business"),
        vec!["#inquiries", "#business"]
    );
}

/// Test: rendering never fails on absent payload fields
#[test]
fn test_rendering_degrades_on_missing_fields() {
    let empty = HashMap::new();

    for event_type in ROUTED_EVENT_TYPES {
        let content = render_content(event_type, &empty);
        assert!(!content.is_empty(), "{} rendered empty content", event_type);
    }
}

/// Test: attachments carry the priority color and payload scalars
#[test]
fn test_attachment_rendering() {
    let payload = payload(&[
        ("component", serde_json::json!("ingest")),
        ("detail", serde_json::json!("connection pool exhausted")),
    ]);

    let attachment = render_attachment("system-error", &payload, Priority::Critical);

    assert_eq!(attachment.title, "System Error");
    assert_eq!(attachment.color, "#dc3545");
    assert!(attachment.fields.iter().any(|f| f.title == "component" && f.value == "ingest"));
    assert!(attachment.fields.iter().any(|f| f.title == "priority" && f.value == "critical"));
}

/// Test: request validation rejects malformed inputs at the boundary
#[test]
fn test_request_validation() {
    let valid = NotificationRequest::new(
        "s1",
        "inquiry-business",
        Priority::High,
        vec!["#inquiries".to_string()],
        HashMap::new(),
    );
    assert!(validate_request(&valid).is_ok());

    let empty_subscriber = NotificationRequest::new(
        "  ",
        "inquiry-business",
        Priority::High,
        vec!["#inquiries".to_string()],
        HashMap::new(),
    );
    assert!(validate_request(&empty_subscriber).is_err());

    let empty_event = NotificationRequest::new(
        "s1",
        "",
        Priority::High,
        vec!["#inquiries".to_string()],
        HashMap::new(),
    );
    assert!(validate_request(&empty_event).is_err());

    let no_valid_channel = NotificationRequest::new(
        "s1",
        "inquiry-business",
        Priority::High,
        vec!["not-a-channel".to_string(), "#".to_string()],
        HashMap::new(),
    );
    assert!(validate_request(&no_valid_channel).is_err());

    let one_valid_among_invalid = NotificationRequest::new(
        "s1",
        "inquiry-business",
        Priority::High,
        vec!["bogus".to_string(), "#inquiries".to_string()],
        HashMap::new(),
    );
    assert!(validate_request(&one_valid_among_invalid).is_ok());
}

/// Test: fallback enrichment happens on a private copy
#[test]
fn test_fallback_enrichment_preserves_original() {
    let original = NotificationRequest::new(
        "s1",
        "custom-event",
        Priority::Low,
        vec!["#missing".to_string()],
        HashMap::new(),
    );

    let enriched = original.with_fallback("#general", "channel_not_found");

    assert_eq!(enriched.channels, vec!["#general"]);
    assert!(enriched.payload.contains_key("original_channels"));
    assert!(enriched.payload.contains_key("failure_reason"));

    assert_eq!(original.channels, vec!["#missing"]);
    assert!(!original.payload.contains_key("failure_reason"));
}
