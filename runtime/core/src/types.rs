use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload carried into every hook emission.
///
/// Event data is a flat JSON object; hooks read the fields they care about
/// and ignore the rest. Session identifiers (`session_id`, `parent_id`)
/// arrive through the registry's default fields.
pub type EventData = serde_json::Map<String, Value>;

/// Merge registry default fields into call-site data.
/// Explicit keys in `data` win over defaults.
pub fn merge_defaults(defaults: &EventData, data: EventData) -> EventData {
    if defaults.is_empty() {
        return data;
    }
    let mut merged = defaults.clone();
    for (key, value) in data {
        merged.insert(key, value);
    }
    merged
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing notice a hook can attach to any result, independent of
/// the action it returns. Routed to the display system when one is
/// configured, logged otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: String,
    pub level: MessageLevel,
}

impl UserMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: MessageLevel::Info }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: MessageLevel::Warning }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: MessageLevel::Error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> EventData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_merge_defaults_call_site_wins() {
        let defaults = map(&[("session_id", json!("s-1")), ("channel", json!("cli"))]);
        let data = map(&[("channel", json!("web")), ("prompt", json!("hi"))]);

        let merged = merge_defaults(&defaults, data);
        assert_eq!(merged.get("session_id"), Some(&json!("s-1")));
        assert_eq!(merged.get("channel"), Some(&json!("web")));
        assert_eq!(merged.get("prompt"), Some(&json!("hi")));
    }

    #[test]
    fn test_merge_defaults_empty_defaults_passthrough() {
        let data = map(&[("prompt", json!("hi"))]);
        let merged = merge_defaults(&EventData::new(), data.clone());
        assert_eq!(merged, data);
    }

    #[test]
    fn test_user_message_serialization() {
        let msg = UserMessage::warning("budget low");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"text": "budget low", "level": "warning"}));
    }
}
