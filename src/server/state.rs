// Lifecycle state module
// Tracks where a server instance is in its start/stop cycle

use std::fmt;

/// Lifecycle state of a [`WebServer`](super::WebServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    /// No listener, no runtime (initial and terminal state)
    Stopped,
    /// Runtime and connector are being built
    Starting,
    /// Accept loop is serving connections
    Running,
    /// Listener closed, in-flight connections draining
    Stopping,
}

impl ServerState {
    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// `Starting -> Stopped` is the rollback taken by a failed start.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running | Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ServerState; 4] = [
        ServerState::Stopped,
        ServerState::Starting,
        ServerState::Running,
        ServerState::Stopping,
    ];

    #[test]
    fn test_full_cycle_is_legal() {
        let cycle = [
            ServerState::Stopped,
            ServerState::Starting,
            ServerState::Running,
            ServerState::Stopping,
            ServerState::Stopped,
        ];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_state_is_skipped() {
        assert!(!ServerState::Stopped.can_transition_to(ServerState::Running));
        assert!(!ServerState::Stopped.can_transition_to(ServerState::Stopping));
        assert!(!ServerState::Running.can_transition_to(ServerState::Stopped));
        assert!(!ServerState::Starting.can_transition_to(ServerState::Stopping));
        assert!(!ServerState::Stopping.can_transition_to(ServerState::Running));
    }

    #[test]
    fn test_no_self_transitions() {
        for state in ALL {
            assert!(!state.can_transition_to(state), "{state} -> {state}");
        }
    }

    #[test]
    fn test_failed_start_rolls_back() {
        assert!(ServerState::Starting.can_transition_to(ServerState::Stopped));
    }

    #[test]
    fn test_only_stopped_is_inactive() {
        let active: Vec<_> = ALL.iter().filter(|s| s.is_active()).collect();
        assert_eq!(active.len(), 3);
        assert!(!ServerState::Stopped.is_active());
    }
}
