pub mod builtin;
pub mod registry;
pub mod types;

pub use builtin::{EventLogHook, FieldFilterHook, StaticContextHook};
pub use registry::{FnHook, Hook, HookHandle, HookRegistry};
pub use types::{ApprovalRequest, ContextInjection, HookAction, HookResult};
