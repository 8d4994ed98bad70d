/// Module coordinator.
///
/// Owns the mount-point registry, the capability map, contribution
/// channels, and the embedded hook registry, and routes hook decisions
/// to the external collaborators (context manager, approval system,
/// display system). One coordinator instance belongs to one session;
/// mutating methods take `&mut self` and are never called concurrently
/// with hook execution.
use std::any::Any;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use modkit_core::types::MessageLevel;
use modkit_core::ModkitError;
use modkit_hooks::types::{ApprovalRequest, ContextInjection, HookAction, HookResult};
use modkit_hooks::HookRegistry;

use crate::collab::{ApprovalSystem, ContextManager, ContextMessage, DisplaySystem};
use crate::config::InjectionLimits;
use crate::contrib::Contributor;
use crate::module::Module;
use crate::mount::MountPoint;

type CleanupFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;
type ModuleMap = HashMap<String, Arc<dyn Module>>;

/// What `get` returns for a mount point: the occupant of a
/// single-occupancy slot, or the full map of a name-keyed one.
pub enum MountEntry {
    Single(Option<Arc<dyn Module>>),
    Multi(ModuleMap),
}

pub struct ModuleCoordinator {
    hooks: HookRegistry,

    orchestrator: Option<Arc<dyn Module>>,
    context: Option<Arc<dyn Module>>,
    module_source_resolver: Option<Arc<dyn Module>>,
    providers: ModuleMap,
    tools: ModuleMap,

    capabilities: HashMap<String, Arc<dyn Any + Send + Sync>>,
    contributors: HashMap<String, Vec<(String, Arc<dyn Contributor>)>>,
    cleanups: Vec<(String, CleanupFn)>,

    context_manager: Option<Arc<dyn ContextManager>>,
    approval_system: Option<Arc<dyn ApprovalSystem>>,
    display_system: Option<Arc<dyn DisplaySystem>>,

    limits: InjectionLimits,
    current_turn_injections: u64,
}

fn mount_single(slot: &mut Option<Arc<dyn Module>>, point: MountPoint, module: Arc<dyn Module>) {
    if let Some(previous) = slot.replace(module) {
        warn!(
            point = %point,
            previous = previous.name().unwrap_or("<unnamed>"),
            "replacing module in single-occupancy mount point"
        );
    } else {
        debug!(point = %point, "module mounted");
    }
}

fn mount_named(map: &mut ModuleMap, point: MountPoint, key: String, module: Arc<dyn Module>) {
    if map.insert(key.clone(), module).is_some() {
        warn!(point = %point, name = %key, "replacing module mounted under the same name");
    } else {
        debug!(point = %point, name = %key, "module mounted");
    }
}

fn clear_single(slot: &mut Option<Arc<dyn Module>>, point: MountPoint) {
    if slot.take().is_some() {
        debug!(point = %point, "module unmounted");
    } else {
        debug!(point = %point, "unmount of an empty mount point, ignoring");
    }
}

fn remove_named(map: &mut ModuleMap, point: MountPoint, key: &str) {
    if map.remove(key).is_some() {
        debug!(point = %point, name = key, "module unmounted");
    } else {
        debug!(point = %point, name = key, "unmount of an absent entry, ignoring");
    }
}

impl ModuleCoordinator {
    pub fn new(limits: InjectionLimits) -> Self {
        Self {
            hooks: HookRegistry::new(),
            orchestrator: None,
            context: None,
            module_source_resolver: None,
            providers: ModuleMap::new(),
            tools: ModuleMap::new(),
            capabilities: HashMap::new(),
            contributors: HashMap::new(),
            cleanups: Vec::new(),
            context_manager: None,
            approval_system: None,
            display_system: None,
            limits,
            current_turn_injections: 0,
        }
    }

    /// The embedded hook registry. Hooks are registered here directly,
    /// never through `mount`.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn set_context_manager(&mut self, manager: Arc<dyn ContextManager>) {
        self.context_manager = Some(manager);
    }

    pub fn set_approval_system(&mut self, approvals: Arc<dyn ApprovalSystem>) {
        self.approval_system = Some(approvals);
    }

    pub fn set_display_system(&mut self, display: Arc<dyn DisplaySystem>) {
        self.display_system = Some(display);
    }

    // -----------------------------------------------------------------
    // Mount points
    // -----------------------------------------------------------------

    /// Attach a module to a mount point. Single-occupancy points replace
    /// any previous occupant with a warning; name-keyed points need a
    /// name, taken from the argument or the module itself.
    pub fn mount(
        &mut self,
        point: &str,
        module: Arc<dyn Module>,
        name: Option<&str>,
    ) -> Result<(), ModkitError> {
        let point: MountPoint = point.parse()?;
        match point {
            MountPoint::Orchestrator => mount_single(&mut self.orchestrator, point, module),
            MountPoint::Context => mount_single(&mut self.context, point, module),
            MountPoint::ModuleSourceResolver => {
                mount_single(&mut self.module_source_resolver, point, module)
            }
            MountPoint::Providers | MountPoint::Tools => {
                let key = name
                    .map(str::to_string)
                    .or_else(|| module.name().map(str::to_string))
                    .ok_or_else(|| ModkitError::NameRequired(point.as_str().to_string()))?;
                let map = if point == MountPoint::Providers {
                    &mut self.providers
                } else {
                    &mut self.tools
                };
                mount_named(map, point, key, module);
            }
        }
        Ok(())
    }

    /// Detach a module. Clearing an already-empty slot or an absent name
    /// is a logged no-op; only an unknown point or a missing required
    /// name is an error.
    pub fn unmount(&mut self, point: &str, name: Option<&str>) -> Result<(), ModkitError> {
        let point: MountPoint = point.parse()?;
        match point {
            MountPoint::Orchestrator => clear_single(&mut self.orchestrator, point),
            MountPoint::Context => clear_single(&mut self.context, point),
            MountPoint::ModuleSourceResolver => {
                clear_single(&mut self.module_source_resolver, point)
            }
            MountPoint::Providers | MountPoint::Tools => {
                let key = name
                    .ok_or_else(|| ModkitError::NameRequired(point.as_str().to_string()))?;
                let map = if point == MountPoint::Providers {
                    &mut self.providers
                } else {
                    &mut self.tools
                };
                remove_named(map, point, key);
            }
        }
        Ok(())
    }

    /// Look up a mount point. Absence is a value, not an error; only an
    /// unknown point fails.
    pub fn get(&self, point: &str) -> Result<MountEntry, ModkitError> {
        let point: MountPoint = point.parse()?;
        Ok(match point {
            MountPoint::Orchestrator => MountEntry::Single(self.orchestrator.clone()),
            MountPoint::Context => MountEntry::Single(self.context.clone()),
            MountPoint::ModuleSourceResolver => {
                MountEntry::Single(self.module_source_resolver.clone())
            }
            MountPoint::Providers => MountEntry::Multi(self.providers.clone()),
            MountPoint::Tools => MountEntry::Multi(self.tools.clone()),
        })
    }

    /// Look up one entry of a mount point. For single-occupancy points
    /// the name is irrelevant and the occupant is returned.
    pub fn get_named(
        &self,
        point: &str,
        name: &str,
    ) -> Result<Option<Arc<dyn Module>>, ModkitError> {
        let point: MountPoint = point.parse()?;
        Ok(match point {
            MountPoint::Orchestrator => self.orchestrator.clone(),
            MountPoint::Context => self.context.clone(),
            MountPoint::ModuleSourceResolver => self.module_source_resolver.clone(),
            MountPoint::Providers => self.providers.get(name).cloned(),
            MountPoint::Tools => self.tools.get(name).cloned(),
        })
    }

    // -----------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------

    /// Register a named capability. Names are dot-namespaced by
    /// convention and not validated; a later registration under the same
    /// name overwrites the earlier one.
    pub fn register_capability(&mut self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        let name = name.into();
        debug!(capability = %name, "capability registered");
        self.capabilities.insert(name, value);
    }

    /// Look up a capability. Callers downcast by convention.
    pub fn get_capability(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.capabilities.get(name).cloned()
    }

    // -----------------------------------------------------------------
    // Contribution channels
    // -----------------------------------------------------------------

    /// Append a contributor to a channel. Registration order is the
    /// collection order.
    pub fn register_contributor(
        &mut self,
        channel: &str,
        name: impl Into<String>,
        contributor: Arc<dyn Contributor>,
    ) {
        let name = name.into();
        debug!(channel, contributor = %name, "contributor registered");
        self.contributors
            .entry(channel.to_string())
            .or_default()
            .push((name, contributor));
    }

    /// Invoke every contributor on a channel and gather their values in
    /// registration order. A `None` yield or a failure skips that
    /// contributor without aborting the round.
    pub async fn collect_contributions(&self, channel: &str) -> Vec<Value> {
        let Some(entries) = self.contributors.get(channel) else {
            return Vec::new();
        };

        let mut collected = Vec::new();
        for (name, contributor) in entries {
            match contributor.contribute().await {
                Ok(Some(value)) => collected.push(value),
                Ok(None) => debug!(channel, contributor = %name, "contributor opted out of this round"),
                Err(e) => warn!(channel, contributor = %name, error = %e, "contributor failed, skipping"),
            }
        }
        collected
    }

    // -----------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------

    /// Register a teardown function to run at shutdown. Cleanups run in
    /// reverse registration order.
    pub fn register_cleanup<F, Fut>(&mut self, name: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.cleanups
            .push((name.into(), Box::new(move || Box::pin(cleanup()))));
    }

    /// Run all registered cleanups, newest first. A failing cleanup is
    /// logged and never prevents the rest from running.
    pub async fn cleanup(&mut self) {
        while let Some((name, cleanup)) = self.cleanups.pop() {
            debug!(cleanup = %name, "running cleanup");
            if let Err(e) = cleanup().await {
                warn!(cleanup = %name, error = %e, "cleanup failed, continuing");
            }
        }
    }

    // -----------------------------------------------------------------
    // Hook-result routing
    // -----------------------------------------------------------------

    /// Route one hook result to the collaborators it concerns and return
    /// the possibly-rewritten result: an `AskUser` becomes `Continue` or
    /// `Deny` once the user has decided.
    ///
    /// Only an oversized injection is an error; every other failure is
    /// absorbed and logged so the dispatch pipeline always completes.
    pub async fn process_hook_result(
        &mut self,
        result: HookResult,
        event: &str,
        hook_name: &str,
    ) -> Result<HookResult, ModkitError> {
        let HookResult { action, user_message, suppress_output } = result;

        let action = match action {
            HookAction::InjectContext(injection) => {
                self.route_injection(&injection, event, hook_name).await?;
                HookAction::InjectContext(injection)
            }
            HookAction::AskUser(request) => self.route_approval(request, event, hook_name).await,
            other => other,
        };

        if let Some(message) = &user_message {
            match &self.display_system {
                Some(display) => display.show_message(&message.text, message.level).await,
                None => match message.level {
                    MessageLevel::Info => info!(event, hook = hook_name, "{}", message.text),
                    MessageLevel::Warning => warn!(event, hook = hook_name, "{}", message.text),
                    MessageLevel::Error => error!(event, hook = hook_name, "{}", message.text),
                },
            }
        }

        if suppress_output {
            debug!(event, hook = hook_name, "output suppression requested, filtering is the orchestrator's job");
        }

        Ok(HookResult { action, user_message, suppress_output })
    }

    async fn route_injection(
        &mut self,
        injection: &ContextInjection,
        event: &str,
        hook_name: &str,
    ) -> Result<(), ModkitError> {
        let bytes = injection.text.len() as u64;
        if let Some(limit) = self.limits.size_limit_bytes {
            if bytes > limit {
                return Err(ModkitError::InjectionTooLarge { bytes, limit });
            }
        }

        let tokens = bytes / 4;
        self.current_turn_injections += tokens;
        if let Some(budget) = self.limits.budget_per_turn {
            if self.current_turn_injections > budget {
                warn!(
                    event,
                    hook = hook_name,
                    spent = self.current_turn_injections,
                    budget,
                    "per-turn injection budget exceeded"
                );
            }
        }

        if injection.ephemeral {
            // The orchestrator splices ephemeral content into the single
            // outgoing request; it is never persisted here.
            debug!(event, hook = hook_name, "ephemeral injection, not persisted");
            return Ok(());
        }

        let Some(context) = &self.context_manager else {
            warn!(event, hook = hook_name, "no context manager configured, dropping injection");
            return Ok(());
        };
        let message = ContextMessage {
            role: injection.role.clone(),
            content: injection.text.clone(),
            metadata: serde_json::json!({
                "source": "hook",
                "hook_name": hook_name,
                "event": event,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        };
        if let Err(e) = context.add_message(message).await {
            warn!(event, hook = hook_name, error = %e, "context manager rejected injection");
        }
        Ok(())
    }

    async fn route_approval(
        &self,
        request: ApprovalRequest,
        event: &str,
        hook_name: &str,
    ) -> HookAction {
        let Some(approvals) = &self.approval_system else {
            warn!(event, hook = hook_name, "approval requested but no approval system configured, denying");
            return HookAction::Deny {
                reason: format!("no approval system available for: {}", request.prompt),
            };
        };

        let wait = Duration::from_secs(request.timeout_secs);
        let decision = match tokio::time::timeout(wait, approvals.request_approval(&request)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!(event, hook = hook_name, error = %e, "approval request failed, applying default");
                request.default.clone()
            }
            Err(_) => {
                warn!(
                    event,
                    hook = hook_name,
                    timeout_secs = request.timeout_secs,
                    "approval request timed out, applying default"
                );
                request.default.clone()
            }
        };

        if decision == request.approving_option() {
            debug!(event, hook = hook_name, %decision, "approval granted");
            HookAction::Continue
        } else {
            info!(event, hook = hook_name, %decision, "approval denied");
            HookAction::Deny { reason: format!("denied by approval decision '{}'", decision) }
        }
    }

    // -----------------------------------------------------------------
    // Turn budget
    // -----------------------------------------------------------------

    /// Approximate injection tokens spent this turn.
    pub fn current_turn_injections(&self) -> u64 {
        self.current_turn_injections
    }

    /// Zero the turn-scoped injection counter. The orchestrator calls
    /// this at each turn boundary; the coordinator never infers turns.
    pub fn reset_turn(&mut self) {
        debug!(spent = self.current_turn_injections, "turn injection counter reset");
        self.current_turn_injections = 0;
    }
}

impl Default for ModuleCoordinator {
    fn default() -> Self {
        Self::new(InjectionLimits::unlimited())
    }
}
