use crate::error::ValidationError;
use crate::models::message::{Message, NotificationRequest};

/// Hard platform ceiling on rendered message text.
pub const MAX_CONTENT_LENGTH: usize = 40_000;

const HUMAN_NAME_MIN: usize = 2;
const HUMAN_NAME_MAX: usize = 80;
const PLATFORM_ID_MIN: usize = 9;
const PLATFORM_ID_MAX: usize = 11;

/// Accepts the two channel grammars: human-readable (`#name` or `@name`,
/// 2-80 chars total) and platform identifier (`C`/`D`/`G` prefix followed by
/// 8-10 alphanumerics, 9-11 chars total).
pub fn is_valid_channel(channel: &str) -> bool {
    let len = channel.chars().count();

    if channel.starts_with('#') || channel.starts_with('@') {
        return (HUMAN_NAME_MIN..=HUMAN_NAME_MAX).contains(&len);
    }

    let mut chars = channel.chars();
    match chars.next() {
        Some('C') | Some('D') | Some('G') => {
            (PLATFORM_ID_MIN..=PLATFORM_ID_MAX).contains(&len)
                && chars.all(|c| c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Boundary check applied before a request may enter the worker queue.
pub fn validate_request(request: &NotificationRequest) -> Result<(), ValidationError> {
    if request.subscriber_id.trim().is_empty() {
        return Err(ValidationError::EmptySubscriber);
    }

    if request.event_type.trim().is_empty() {
        return Err(ValidationError::EmptyEventType);
    }

    if !request.channels.iter().any(|c| is_valid_channel(c)) {
        return Err(ValidationError::NoValidChannel(request.channels.clone()));
    }

    Ok(())
}

/// Pre-flight check on a rendered message, applied before any network call.
pub fn validate_message(message: &Message) -> Result<(), ValidationError> {
    if message.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    let length = message.content.chars().count();
    if length > MAX_CONTENT_LENGTH {
        return Err(ValidationError::ContentTooLong {
            length,
            limit: MAX_CONTENT_LENGTH,
        });
    }

    for channel in &message.channels {
        if !is_valid_channel(channel) {
            return Err(ValidationError::InvalidChannel(channel.clone()));
        }
    }

    Ok(())
}
