//! Component lifecycle states.

use std::fmt;

/// Where a component is in its connect cycle.
///
/// `Unattached -> Connected -> Disconnected -> Connected -> ... -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Created, never inserted into the document.
    #[default]
    Unattached,
    Connected,
    Disconnected,
    /// Terminal. Bindings are released and the host is forgotten.
    Destroyed,
}

impl LifecycleState {
    pub fn is_connected(self) -> bool {
        self == LifecycleState::Connected
    }

    pub fn is_destroyed(self) -> bool {
        self == LifecycleState::Destroyed
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unattached => "unattached",
            LifecycleState::Connected => "connected",
            LifecycleState::Disconnected => "disconnected",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
