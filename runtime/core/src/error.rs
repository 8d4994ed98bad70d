use thiserror::Error;

/// Top-level error type for the modkit runtime.
#[derive(Debug, Error)]
pub enum ModkitError {
    #[error("unknown mount point: {0}")]
    UnknownMountPoint(String),

    #[error("a name is required to address the '{0}' mount point")]
    NameRequired(String),

    #[error("hooks are managed through the hook registry, not mount/unmount")]
    HooksNotMountable,

    #[error("context injection of {bytes} bytes exceeds the size limit of {limit} bytes")]
    InjectionTooLarge { bytes: u64, limit: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
