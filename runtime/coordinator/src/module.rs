use std::any::Any;

/// A mountable module instance.
///
/// Modules are opaque to the coordinator; consumers that retrieve one
/// from a mount point downcast it through `as_any` by convention.
pub trait Module: Send + Sync {
    /// The module's own name, used to key multi-occupancy mount points
    /// when the caller does not supply one.
    fn name(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
