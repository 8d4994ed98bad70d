pub mod collab;
pub mod config;
pub mod contrib;
pub mod coordinator;
pub mod module;
pub mod mount;

pub use collab::{ApprovalSystem, ContextManager, ContextMessage, DisplaySystem};
pub use config::InjectionLimits;
pub use contrib::{Contributor, FnContributor};
pub use coordinator::{ModuleCoordinator, MountEntry};
pub use module::Module;
pub use mount::MountPoint;
