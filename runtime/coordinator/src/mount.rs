use std::fmt;
use std::str::FromStr;

use modkit_core::ModkitError;

/// A named slot in the coordinator where a module instance attaches.
///
/// `Orchestrator`, `Context`, and `ModuleSourceResolver` hold at most one
/// module; `Providers` and `Tools` are name-keyed maps. The built-in
/// `hooks` slot is managed exclusively through the hook registry and is
/// not mountable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountPoint {
    Orchestrator,
    Context,
    Providers,
    Tools,
    ModuleSourceResolver,
}

impl MountPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Context => "context",
            Self::Providers => "providers",
            Self::Tools => "tools",
            Self::ModuleSourceResolver => "module-source-resolver",
        }
    }

    /// True for the name-keyed mount points.
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Providers | Self::Tools)
    }
}

impl FromStr for MountPoint {
    type Err = ModkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orchestrator" => Ok(Self::Orchestrator),
            "context" => Ok(Self::Context),
            "providers" => Ok(Self::Providers),
            "tools" => Ok(Self::Tools),
            "module-source-resolver" => Ok(Self::ModuleSourceResolver),
            "hooks" => Err(ModkitError::HooksNotMountable),
            other => Err(ModkitError::UnknownMountPoint(other.to_string())),
        }
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
