/// Hook result model.
///
/// A hook returns exactly one decision (`HookAction`) plus two orthogonal
/// fields that are meaningful regardless of the action: a user-facing
/// notice and an output-suppression flag.
use serde::{Deserialize, Serialize};

use modkit_core::types::{EventData, UserMessage};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The decision a hook makes about the event it observed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    /// Let the pipeline proceed unchanged.
    #[default]
    Continue,
    /// Halt the pipeline. No later hook on the same emission runs.
    Deny { reason: String },
    /// Replace the event data for every later hook on the same emission.
    Modify { data: EventData },
    /// Add content to the conversation context.
    InjectContext(ContextInjection),
    /// Ask the user to approve or reject before proceeding.
    AskUser(ApprovalRequest),
}

/// Context content a hook wants added to the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextInjection {
    pub text: String,
    /// Message role the content is attributed to.
    pub role: String,
    /// Ephemeral content is spliced into the next outgoing request only,
    /// never persisted to conversation history.
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub append_to_last_tool_result: bool,
}

impl ContextInjection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: "system".to_string(),
            ephemeral: false,
            append_to_last_tool_result: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn append_to_last_tool_result(mut self) -> Self {
        self.append_to_last_tool_result = true;
        self
    }
}

/// An approval prompt for the user.
///
/// Convention: `options` are ordered with the approving choice first;
/// any other decision, the timeout `default` included, counts as a
/// rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub prompt: String,
    pub options: Vec<String>,
    pub timeout_secs: u64,
    /// Decision applied when the user does not answer within the timeout.
    pub default: String,
}

impl ApprovalRequest {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: vec!["allow".to_string(), "deny".to_string()],
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            default: "deny".to_string(),
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// The option that counts as approval: the first one.
    pub fn approving_option(&self) -> &str {
        self.options.first().map(String::as_str).unwrap_or("allow")
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Result returned by a hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookResult {
    #[serde(flatten)]
    pub action: HookAction,
    /// A notice to surface to the user, whatever the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<UserMessage>,
    /// Request that the orchestrator suppress this event's output.
    #[serde(default)]
    pub suppress_output: bool,
}

impl HookResult {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { action: HookAction::Deny { reason: reason.into() }, ..Default::default() }
    }

    pub fn modify(data: EventData) -> Self {
        Self { action: HookAction::Modify { data }, ..Default::default() }
    }

    pub fn inject(injection: ContextInjection) -> Self {
        Self { action: HookAction::InjectContext(injection), ..Default::default() }
    }

    pub fn ask(request: ApprovalRequest) -> Self {
        Self { action: HookAction::AskUser(request), ..Default::default() }
    }

    pub fn with_user_message(mut self, message: UserMessage) -> Self {
        self.user_message = Some(message);
        self
    }

    pub fn with_suppressed_output(mut self) -> Self {
        self.suppress_output = true;
        self
    }

    pub fn is_deny(&self) -> bool {
        matches!(self.action, HookAction::Deny { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_result_continues() {
        let result = HookResult::pass();
        assert!(matches!(result.action, HookAction::Continue));
        assert!(result.user_message.is_none());
        assert!(!result.suppress_output);
    }

    #[test]
    fn test_action_tag_serialization() {
        let result = HookResult::deny("blocked by policy");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["action"], "deny");
        assert_eq!(json["reason"], "blocked by policy");
        assert_eq!(json["suppress_output"], json!(false));
    }

    #[test]
    fn test_inject_serialization_roundtrip() {
        let result = HookResult::inject(
            ContextInjection::new("remember the deadline").with_role("user").ephemeral(),
        );
        let json = serde_json::to_string(&result).unwrap();
        let back: HookResult = serde_json::from_str(&json).unwrap();
        match back.action {
            HookAction::InjectContext(inj) => {
                assert_eq!(inj.text, "remember the deadline");
                assert_eq!(inj.role, "user");
                assert!(inj.ephemeral);
            }
            other => panic!("expected inject, got {:?}", other),
        }
    }

    #[test]
    fn test_approval_request_defaults() {
        let req = ApprovalRequest::new("run rm -rf?");
        assert_eq!(req.approving_option(), "allow");
        assert_eq!(req.default, "deny");
        assert_eq!(req.timeout_secs, ApprovalRequest::DEFAULT_TIMEOUT_SECS);
    }
}
