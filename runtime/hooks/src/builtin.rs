/// Built-in hook implementations.
///
/// Bundled hooks that ship with modkit and can be registered by an
/// orchestrator at session start. Each hook is a concrete struct that
/// implements the `Hook` trait.
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use modkit_core::types::EventData;

use crate::registry::Hook;
use crate::types::{ContextInjection, HookResult};

// ---------------------------------------------------------------------------
// Event log hook — logs every emission
// ---------------------------------------------------------------------------

pub struct EventLogHook {
    pub prefix: String,
}

impl EventLogHook {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

#[async_trait]
impl Hook for EventLogHook {
    fn name(&self) -> &str {
        "event_log_hook"
    }

    async fn run(&self, event: &str, _data: &EventData) -> Result<HookResult> {
        info!("[{}] Event fired: {}", self.prefix, event);
        Ok(HookResult::pass())
    }
}

// ---------------------------------------------------------------------------
// Field filter hook — denies when a data field contains a blocked substring
// ---------------------------------------------------------------------------

pub struct FieldFilterHook {
    /// Data field to inspect (missing or non-string fields pass).
    pub field: String,
    pub blocked_substrings: Vec<String>,
}

impl FieldFilterHook {
    pub fn new(field: impl Into<String>, blocked_substrings: Vec<String>) -> Self {
        Self { field: field.into(), blocked_substrings }
    }
}

#[async_trait]
impl Hook for FieldFilterHook {
    fn name(&self) -> &str {
        "field_filter_hook"
    }

    async fn run(&self, _event: &str, data: &EventData) -> Result<HookResult> {
        let Some(value) = data.get(&self.field).and_then(|v| v.as_str()) else {
            return Ok(HookResult::pass());
        };

        let lower = value.to_lowercase();
        for blocked in &self.blocked_substrings {
            if lower.contains(blocked.as_str()) {
                return Ok(HookResult::deny(format!("Blocked content detected: {}", blocked)));
            }
        }
        Ok(HookResult::pass())
    }
}

// ---------------------------------------------------------------------------
// Static context hook — injects a fixed context block on configured events
// ---------------------------------------------------------------------------

pub struct StaticContextHook {
    pub events: Vec<String>,
    pub text: String,
    pub ephemeral: bool,
}

impl StaticContextHook {
    pub fn new(events: Vec<String>, text: impl Into<String>) -> Self {
        Self { events, text: text.into(), ephemeral: false }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

#[async_trait]
impl Hook for StaticContextHook {
    fn name(&self) -> &str {
        "static_context_hook"
    }

    async fn run(&self, event: &str, _data: &EventData) -> Result<HookResult> {
        if !self.events.iter().any(|e| e == event) {
            return Ok(HookResult::pass());
        }
        let mut injection = ContextInjection::new(self.text.clone());
        if self.ephemeral {
            injection = injection.ephemeral();
        }
        Ok(HookResult::inject(injection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HookAction;
    use serde_json::json;

    fn data_with(field: &str, value: &str) -> EventData {
        [(field.to_string(), json!(value))].into_iter().collect()
    }

    #[tokio::test]
    async fn test_field_filter_denies_blocked_substring() {
        let hook = FieldFilterHook::new("prompt", vec!["secret".to_string()]);
        let result = hook.run("prompt:submit", &data_with("prompt", "my SECRET plan")).await.unwrap();
        assert!(result.is_deny());
    }

    #[tokio::test]
    async fn test_field_filter_passes_missing_field() {
        let hook = FieldFilterHook::new("prompt", vec!["secret".to_string()]);
        let result = hook.run("prompt:submit", &data_with("other", "secret")).await.unwrap();
        assert!(!result.is_deny());
    }

    #[tokio::test]
    async fn test_static_context_only_fires_on_configured_events() {
        let hook = StaticContextHook::new(vec!["prompt:submit".to_string()], "house rules");

        let hit = hook.run("prompt:submit", &EventData::new()).await.unwrap();
        assert!(matches!(hit.action, HookAction::InjectContext(_)));

        let miss = hook.run("tool:pre", &EventData::new()).await.unwrap();
        assert!(matches!(miss.action, HookAction::Continue));
    }
}
