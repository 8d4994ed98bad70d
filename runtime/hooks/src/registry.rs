/// Hook trait and registry.
///
/// Hooks are async callbacks that observe or transform lifecycle events.
/// Multiple hooks can be registered per event; `emit` runs them one at a
/// time in ascending priority order, so later hooks observe data modified
/// by earlier ones. The first hook to deny halts the chain.
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use modkit_core::types::{EventData, UserMessage, merge_defaults};

use crate::types::{ApprovalRequest, ContextInjection, HookAction, HookResult};

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

/// A hook that runs when a named lifecycle event fires.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name for logging and introspection. An empty name marks the hook
    /// as anonymous; anonymous hooks are excluded from listings.
    fn name(&self) -> &str;

    /// Run the hook. Return `HookResult::pass()` to continue normally.
    async fn run(&self, event: &str, data: &EventData) -> Result<HookResult>;
}

type HookFuture = Pin<Box<dyn Future<Output = Result<HookResult>> + Send>>;

/// Adapter wrapping an async closure as a `Hook`.
pub struct FnHook {
    name: String,
    callback: Box<dyn Fn(String, EventData) -> HookFuture + Send + Sync>,
}

impl FnHook {
    pub fn new<F, Fut>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(String, EventData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(move |event, data| Box::pin(callback(event, data))),
        }
    }

    /// An anonymous closure hook, excluded from `list_handlers`.
    pub fn anonymous<F, Fut>(callback: F) -> Self
    where
        F: Fn(String, EventData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult>> + Send + 'static,
    {
        Self::new("", callback)
    }
}

#[async_trait]
impl Hook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, event: &str, data: &EventData) -> Result<HookResult> {
        (self.callback)(event.to_string(), data.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct HandlerEntry {
    id: u64,
    priority: i64,
    hook: Arc<dyn Hook>,
}

#[derive(Default)]
struct RegistryInner {
    handlers: HashMap<String, Vec<HandlerEntry>>,
    defaults: EventData,
    next_id: u64,
}

/// Handle returned by `register`. Consuming it removes exactly that
/// registration; the handler record itself never escapes the registry.
pub struct HookHandle {
    event: String,
    name: String,
    id: u64,
    inner: Arc<RwLock<RegistryInner>>,
}

impl HookHandle {
    pub async fn unregister(self) {
        let mut inner = self.inner.write().await;
        if let Some(chain) = inner.handlers.get_mut(&self.event) {
            chain.retain(|entry| entry.id != self.id);
            debug!(event = %self.event, hook = %self.name, "hook unregistered");
        }
    }
}

/// Registry of hooks organized by event name.
///
/// `emit` dispatches sequentially in priority order; `emit_and_collect`
/// fans out concurrently for vote-style events where results are
/// aggregated instead of chained.
#[derive(Default, Clone)]
pub struct HookRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for an event at the given priority (lower runs
    /// first; equal priorities keep registration order). Registering the
    /// same name twice creates two independent registrations.
    pub async fn register(&self, event: &str, hook: Arc<dyn Hook>, priority: i64) -> HookHandle {
        let name = hook.name().to_string();
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let chain = inner.handlers.entry(event.to_string()).or_default();
        chain.push(HandlerEntry { id, priority, hook });
        chain.sort_by_key(|entry| entry.priority);
        debug!(event, hook = %name, priority, "hook registered");
        HookHandle { event: event.to_string(), name, id, inner: Arc::clone(&self.inner) }
    }

    /// Merge default fields into every future emission's data. Call-site
    /// keys win on collision.
    pub async fn set_default_fields(&self, fields: EventData) {
        let mut inner = self.inner.write().await;
        for (key, value) in fields {
            inner.defaults.insert(key, value);
        }
    }

    /// Snapshot the chain for an event with defaults merged into `data`.
    async fn snapshot(&self, event: &str, data: EventData) -> (Vec<Arc<dyn Hook>>, EventData) {
        let inner = self.inner.read().await;
        let merged = merge_defaults(&inner.defaults, data);
        let chain = inner
            .handlers
            .get(event)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.hook)).collect())
            .unwrap_or_default();
        (chain, merged)
    }

    /// Run all hooks registered for `event` sequentially and return the
    /// accumulated result.
    ///
    /// `Deny` short-circuits and is returned unchanged. `Modify` replaces
    /// the data seen by later hooks. Multiple injections merge into one;
    /// only the first approval request survives. A failing or panicking
    /// hook is logged and skipped, never aborting the emission.
    pub async fn emit(&self, event: &str, data: EventData) -> HookResult {
        let (chain, merged) = self.snapshot(event, data).await;
        if chain.is_empty() {
            return HookResult::pass();
        }

        let mut current = merged;
        let mut modified: Option<EventData> = None;
        let mut injection: Option<ContextInjection> = None;
        let mut approval: Option<ApprovalRequest> = None;
        let mut user_message: Option<UserMessage> = None;
        let mut suppress_output = false;

        for hook in &chain {
            debug!(event, hook = %hook.name(), "running hook");
            let outcome = AssertUnwindSafe(hook.run(event, &current)).catch_unwind().await;
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(event, hook = %hook.name(), error = %e, "hook failed, continuing");
                    continue;
                }
                Err(_) => {
                    warn!(event, hook = %hook.name(), "hook panicked, continuing");
                    continue;
                }
            };

            if result.is_deny() {
                debug!(event, hook = %hook.name(), "hook denied, halting chain");
                return result;
            }

            let HookResult { action, user_message: message, suppress_output: suppress } = result;
            suppress_output |= suppress;
            if message.is_some() {
                user_message = message;
            }

            match action {
                HookAction::Continue => {}
                HookAction::Modify { data } => {
                    current = data.clone();
                    modified = Some(data);
                }
                HookAction::InjectContext(inj) => match injection.as_mut() {
                    // Later injections append; the first hook's role and
                    // ephemeral settings stand.
                    Some(first) => {
                        first.text.push_str("\n\n");
                        first.text.push_str(&inj.text);
                    }
                    None => injection = Some(inj),
                },
                HookAction::AskUser(request) => {
                    if approval.is_none() {
                        approval = Some(request);
                    } else {
                        debug!(event, hook = %hook.name(), "approval prompts cannot be merged, discarding");
                    }
                }
                HookAction::Deny { .. } => unreachable!("deny handled above"),
            }
        }

        let action = if let Some(request) = approval {
            HookAction::AskUser(request)
        } else if let Some(inj) = injection {
            HookAction::InjectContext(inj)
        } else if let Some(data) = modified {
            HookAction::Modify { data }
        } else {
            HookAction::Continue
        };
        HookResult { action, user_message, suppress_output }
    }

    /// Run all hooks for `event` independently and collect their `Modify`
    /// payloads in handler order. Hooks run concurrently, each bounded by
    /// `timeout`; failed, panicked, timed-out, and payload-less hooks are
    /// dropped from the output.
    pub async fn emit_and_collect(
        &self,
        event: &str,
        data: EventData,
        timeout: Duration,
    ) -> Vec<Value> {
        let (chain, merged) = self.snapshot(event, data).await;

        let tasks = chain.into_iter().map(|hook| {
            let data = merged.clone();
            let event = event.to_string();
            async move {
                let run = AssertUnwindSafe(hook.run(&event, &data)).catch_unwind();
                match tokio::time::timeout(timeout, run).await {
                    Ok(Ok(Ok(result))) => match result.action {
                        HookAction::Modify { data } => Some(Value::Object(data)),
                        _ => None,
                    },
                    Ok(Ok(Err(e))) => {
                        warn!(event = %event, hook = %hook.name(), error = %e, "hook failed, dropping");
                        None
                    }
                    Ok(Err(_)) => {
                        warn!(event = %event, hook = %hook.name(), "hook panicked, dropping");
                        None
                    }
                    Err(_) => {
                        warn!(event = %event, hook = %hook.name(), "hook timed out, dropping");
                        None
                    }
                }
            }
        });

        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Named handlers per event, in execution order. Pass an event to
    /// restrict the listing; anonymous hooks are excluded either way.
    pub async fn list_handlers(&self, event: Option<&str>) -> HashMap<String, Vec<String>> {
        let inner = self.inner.read().await;
        let mut listing = HashMap::new();
        for (key, entries) in &inner.handlers {
            if event.is_some_and(|e| e != key.as_str()) {
                continue;
            }
            let names: Vec<String> = entries
                .iter()
                .map(|e| e.hook.name().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if !names.is_empty() {
                listing.insert(key.clone(), names);
            }
        }
        listing
    }

    /// Number of handlers registered for an event.
    pub async fn handler_count(&self, event: &str) -> usize {
        let inner = self.inner.read().await;
        inner.handlers.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modkit_core::events;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn data(pairs: &[(&str, Value)]) -> EventData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn recording_hook(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Hook> {
        let name_owned = name.to_string();
        Arc::new(FnHook::new(name, move |_event, _data| {
            let log = Arc::clone(&log);
            let name = name_owned.clone();
            async move {
                log.lock().unwrap().push(name);
                Ok(HookResult::pass())
            }
        }))
    }

    #[tokio::test]
    async fn test_emit_runs_in_priority_order() {
        let registry = HookRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(events::TOOL_PRE, recording_hook("late", Arc::clone(&log)), 10).await;
        registry.register(events::TOOL_PRE, recording_hook("early", Arc::clone(&log)), -5).await;
        registry.register(events::TOOL_PRE, recording_hook("mid", Arc::clone(&log)), 0).await;

        registry.emit(events::TOOL_PRE, EventData::new()).await;
        assert_eq!(*log.lock().unwrap(), vec!["early", "mid", "late"]);
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_registration_order() {
        let registry = HookRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            registry.register("turn:start", recording_hook(name, Arc::clone(&log)), 0).await;
        }

        registry.emit("turn:start", EventData::new()).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_emit_without_handlers_continues() {
        let registry = HookRegistry::new();
        let result = registry.emit(events::SESSION_START, EventData::new()).await;
        assert!(matches!(result.action, HookAction::Continue));
    }

    #[tokio::test]
    async fn test_deny_short_circuits() {
        let registry = HookRegistry::new();
        let ran_after = Arc::new(AtomicUsize::new(0));

        registry
            .register(
                "tool:pre",
                Arc::new(FnHook::new("gate", |_, _| async {
                    Ok(HookResult::deny("tool is blocked"))
                })),
                0,
            )
            .await;
        let counter = Arc::clone(&ran_after);
        registry
            .register(
                "tool:pre",
                Arc::new(FnHook::new("after", move |_, _| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(HookResult::pass())
                    }
                })),
                5,
            )
            .await;

        let result = registry.emit("tool:pre", EventData::new()).await;
        match result.action {
            HookAction::Deny { reason } => assert_eq!(reason, "tool is blocked"),
            other => panic!("expected deny, got {:?}", other),
        }
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_modify_chains_to_later_hooks() {
        let registry = HookRegistry::new();

        registry
            .register(
                "prompt:submit",
                Arc::new(FnHook::new("rewriter", |_, _| async {
                    Ok(HookResult::modify(
                        [("prompt".to_string(), json!("rewritten"))].into_iter().collect(),
                    ))
                })),
                0,
            )
            .await;
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        registry
            .register(
                "prompt:submit",
                Arc::new(FnHook::new("observer", move |_, data| {
                    let sink = Arc::clone(&sink);
                    async move {
                        *sink.lock().unwrap() = data.get("prompt").cloned();
                        Ok(HookResult::pass())
                    }
                })),
                1,
            )
            .await;

        let result = registry
            .emit("prompt:submit", data(&[("prompt", json!("original"))]))
            .await;
        assert_eq!(*observed.lock().unwrap(), Some(json!("rewritten")));
        match result.action {
            HookAction::Modify { data } => assert_eq!(data.get("prompt"), Some(&json!("rewritten"))),
            other => panic!("expected modify, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_injections_merge_preserving_first_role() {
        let registry = HookRegistry::new();

        registry
            .register(
                "prompt:submit",
                Arc::new(FnHook::new("memory", |_, _| async {
                    Ok(HookResult::inject(ContextInjection::new("first block").with_role("user")))
                })),
                0,
            )
            .await;
        registry
            .register(
                "prompt:submit",
                Arc::new(FnHook::new("style", |_, _| async {
                    Ok(HookResult::inject(ContextInjection::new("second block")))
                })),
                1,
            )
            .await;

        let result = registry.emit("prompt:submit", EventData::new()).await;
        match result.action {
            HookAction::InjectContext(inj) => {
                assert_eq!(inj.text, "first block\n\nsecond block");
                assert_eq!(inj.role, "user");
            }
            other => panic!("expected inject, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_ask_user_wins() {
        let registry = HookRegistry::new();

        registry
            .register(
                "tool:pre",
                Arc::new(FnHook::new("a", |_, _| async {
                    Ok(HookResult::ask(ApprovalRequest::new("first prompt")))
                })),
                0,
            )
            .await;
        registry
            .register(
                "tool:pre",
                Arc::new(FnHook::new("b", |_, _| async {
                    Ok(HookResult::ask(ApprovalRequest::new("second prompt")))
                })),
                1,
            )
            .await;

        let result = registry.emit("tool:pre", EventData::new()).await;
        match result.action {
            HookAction::AskUser(req) => assert_eq!(req.prompt, "first prompt"),
            other => panic!("expected ask_user, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_abort_emission() {
        let registry = HookRegistry::new();

        registry
            .register(
                "turn:end",
                Arc::new(FnHook::new("broken", |_, _| async {
                    Err(anyhow::anyhow!("boom"))
                })),
                0,
            )
            .await;
        registry
            .register(
                "turn:end",
                Arc::new(FnHook::new("survivor", |_, _| async {
                    Ok(HookResult::modify(
                        [("ok".to_string(), json!(true))].into_iter().collect(),
                    ))
                })),
                1,
            )
            .await;

        let result = registry.emit("turn:end", EventData::new()).await;
        assert!(matches!(result.action, HookAction::Modify { .. }));
    }

    #[tokio::test]
    async fn test_panicking_hook_is_isolated() {
        let registry = HookRegistry::new();

        registry
            .register(
                "turn:end",
                Arc::new(FnHook::new("panicky", |_, _| async { panic!("hook bug") })),
                0,
            )
            .await;
        registry
            .register(
                "turn:end",
                Arc::new(FnHook::new("survivor", |_, _| async {
                    Ok(HookResult::deny("still reachable"))
                })),
                1,
            )
            .await;

        let result = registry.emit("turn:end", EventData::new()).await;
        assert!(result.is_deny());
    }

    #[tokio::test]
    async fn test_default_fields_visible_and_overridable() {
        let registry = HookRegistry::new();
        let session_id = uuid::Uuid::new_v4().to_string();
        registry
            .set_default_fields(data(&[
                ("session_id", json!(session_id)),
                ("channel", json!("default")),
            ]))
            .await;

        let observed = Arc::new(Mutex::new(EventData::new()));
        let sink = Arc::clone(&observed);
        registry
            .register(
                "session:start",
                Arc::new(FnHook::new("observer", move |_, data| {
                    let sink = Arc::clone(&sink);
                    async move {
                        *sink.lock().unwrap() = data;
                        Ok(HookResult::pass())
                    }
                })),
                0,
            )
            .await;

        registry
            .emit("session:start", data(&[("channel", json!("override"))]))
            .await;
        let seen = observed.lock().unwrap();
        assert_eq!(seen.get("session_id"), Some(&json!(session_id)));
        assert_eq!(seen.get("channel"), Some(&json!("override")));
    }

    #[tokio::test]
    async fn test_unregister_removes_handler() {
        let registry = HookRegistry::new();
        let handle = registry
            .register(
                "session:end",
                Arc::new(FnHook::new("transient", |_, _| async { Ok(HookResult::pass()) })),
                0,
            )
            .await;

        assert_eq!(registry.handler_count("session:end").await, 1);
        handle.unregister().await;
        assert_eq!(registry.handler_count("session:end").await, 0);
        assert!(registry.list_handlers(Some("session:end")).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_handlers_excludes_anonymous() {
        let registry = HookRegistry::new();
        registry
            .register(
                "tool:post",
                Arc::new(FnHook::new("named", |_, _| async { Ok(HookResult::pass()) })),
                0,
            )
            .await;
        registry
            .register(
                "tool:post",
                Arc::new(FnHook::anonymous(|_, _| async { Ok(HookResult::pass()) })),
                1,
            )
            .await;

        let listing = registry.list_handlers(None).await;
        assert_eq!(listing.get("tool:post"), Some(&vec!["named".to_string()]));
    }

    #[tokio::test]
    async fn test_emit_and_collect_gathers_in_order() {
        let registry = HookRegistry::new();
        registry
            .register(
                "provider:select",
                Arc::new(FnHook::new("slow-vote", |_, _| async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(HookResult::modify(
                        [("vote".to_string(), json!("b"))].into_iter().collect(),
                    ))
                })),
                1,
            )
            .await;
        registry
            .register(
                "provider:select",
                Arc::new(FnHook::new("fast-vote", |_, _| async {
                    Ok(HookResult::modify(
                        [("vote".to_string(), json!("a"))].into_iter().collect(),
                    ))
                })),
                0,
            )
            .await;
        registry
            .register(
                "provider:select",
                Arc::new(FnHook::new("abstain", |_, _| async { Ok(HookResult::pass()) })),
                2,
            )
            .await;

        let votes = registry
            .emit_and_collect("provider:select", EventData::new(), Duration::from_secs(1))
            .await;
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0]["vote"], json!("a"));
        assert_eq!(votes[1]["vote"], json!("b"));
    }

    #[tokio::test]
    async fn test_emit_and_collect_drops_timed_out_handler() {
        let registry = HookRegistry::new();
        registry
            .register(
                "provider:select",
                Arc::new(FnHook::new("stuck", |_, _| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(HookResult::modify(
                        [("vote".to_string(), json!("never"))].into_iter().collect(),
                    ))
                })),
                0,
            )
            .await;
        registry
            .register(
                "provider:select",
                Arc::new(FnHook::new("prompt-vote", |_, _| async {
                    Ok(HookResult::modify(
                        [("vote".to_string(), json!("yes"))].into_iter().collect(),
                    ))
                })),
                1,
            )
            .await;

        let votes = registry
            .emit_and_collect("provider:select", EventData::new(), Duration::from_millis(50))
            .await;
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0]["vote"], json!("yes"));
    }

    #[tokio::test]
    async fn test_suppress_output_accumulates() {
        let registry = HookRegistry::new();
        registry
            .register(
                "tool:post",
                Arc::new(FnHook::new("quiet", |_, _| async {
                    Ok(HookResult::pass().with_suppressed_output())
                })),
                0,
            )
            .await;
        registry
            .register(
                "tool:post",
                Arc::new(FnHook::new("loud", |_, _| async { Ok(HookResult::pass()) })),
                1,
            )
            .await;

        let result = registry.emit("tool:post", EventData::new()).await;
        assert!(result.suppress_output);
    }
}
