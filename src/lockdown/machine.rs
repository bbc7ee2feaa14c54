use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a lockdown session.
///
/// `Unlocking` is transient: an unlock request enters it and leaves for
/// `TemporarilyUnlocked` or `Terminating` within the same event, so no
/// timer or message ever observes it as the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Surface visible and guarded, shortcuts held.
    #[default]
    Locked,
    /// Unlock request being resolved against the profile.
    Unlocking,
    /// Surface hidden, waiting out the unlock window.
    TemporarilyUnlocked,
    /// Teardown in progress, cleanup deadline pending.
    Terminating,
    Terminated,
}

impl LockState {
    pub fn allowed_transitions(&self) -> &'static [LockState] {
        use LockState::*;
        match self {
            Locked => &[Unlocking],
            Unlocking => &[TemporarilyUnlocked, Terminating],
            TemporarilyUnlocked => &[Locked],
            Terminating => &[Terminated],
            Terminated => &[],
        }
    }

    pub fn can_transition_to(&self, target: LockState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LockState::Terminated)
    }

    /// Whether the focus guard runs in this state.
    pub fn is_enforcing(&self) -> bool {
        matches!(self, LockState::Locked)
    }

    /// Whether an unexpectedly destroyed surface gets recreated.
    pub fn respawns_surface(&self) -> bool {
        matches!(
            self,
            LockState::Locked | LockState::Unlocking | LockState::TemporarilyUnlocked
        )
    }

    /// Whether global shortcuts stay claimed. They are held through
    /// temporary unlocks and released only on the way out.
    pub fn holds_shortcuts(&self) -> bool {
        !matches!(self, LockState::Terminating | LockState::Terminated)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Locked => "Locked",
            Self::Unlocking => "Unlocking",
            Self::TemporarilyUnlocked => "TemporarilyUnlocked",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(LockState::Locked.can_transition_to(LockState::Unlocking));
        assert!(LockState::Unlocking.can_transition_to(LockState::TemporarilyUnlocked));
        assert!(LockState::Unlocking.can_transition_to(LockState::Terminating));
        assert!(LockState::TemporarilyUnlocked.can_transition_to(LockState::Locked));
        assert!(LockState::Terminating.can_transition_to(LockState::Terminated));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!LockState::Locked.can_transition_to(LockState::TemporarilyUnlocked));
        assert!(!LockState::Locked.can_transition_to(LockState::Terminating));
        assert!(!LockState::TemporarilyUnlocked.can_transition_to(LockState::Terminating));
        assert!(!LockState::Terminating.can_transition_to(LockState::Locked));
        assert!(!LockState::Terminated.can_transition_to(LockState::Locked));
    }

    #[test]
    fn test_terminal_state() {
        assert!(LockState::Terminated.is_terminal());
        assert!(LockState::Terminated.allowed_transitions().is_empty());
        assert!(!LockState::Terminating.is_terminal());
        assert!(!LockState::Locked.is_terminal());
    }

    #[test]
    fn test_enforcement_only_while_locked() {
        assert!(LockState::Locked.is_enforcing());
        assert!(!LockState::Unlocking.is_enforcing());
        assert!(!LockState::TemporarilyUnlocked.is_enforcing());
        assert!(!LockState::Terminating.is_enforcing());
    }

    #[test]
    fn test_respawn_states() {
        assert!(LockState::Locked.respawns_surface());
        assert!(LockState::TemporarilyUnlocked.respawns_surface());
        assert!(!LockState::Terminating.respawns_surface());
        assert!(!LockState::Terminated.respawns_surface());
    }

    #[test]
    fn test_shortcuts_held_through_temporary_unlock() {
        assert!(LockState::Locked.holds_shortcuts());
        assert!(LockState::TemporarilyUnlocked.holds_shortcuts());
        assert!(!LockState::Terminating.holds_shortcuts());
        assert!(!LockState::Terminated.holds_shortcuts());
    }
}
