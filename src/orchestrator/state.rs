//! Orchestrator lifecycle states

use std::fmt;

/// Where a run currently is.
///
/// `DaemonStarting` and `DaemonReady` are skipped when hidden services
/// are disabled. A workspace that cannot be created sends the run from
/// `Idle` straight to `BindingServices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    WorkspaceReady,
    DaemonStarting,
    DaemonReady,
    BindingServices,
    Running,
    ShuttingDown,
    Stopped,
}

impl OrchestratorState {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrchestratorState::*;
        if self.is_stopping() {
            return self == ShuttingDown && next == Stopped;
        }
        matches!(
            (self, next),
            (Idle, WorkspaceReady)
                | (Idle, BindingServices)
                | (WorkspaceReady, DaemonStarting)
                | (WorkspaceReady, BindingServices)
                | (DaemonStarting, DaemonReady)
                | (DaemonStarting, BindingServices)
                | (DaemonReady, BindingServices)
                | (BindingServices, Running)
                | (_, ShuttingDown)
        )
    }

    pub fn is_stopping(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WorkspaceReady => "workspace-ready",
            Self::DaemonStarting => "daemon-starting",
            Self::DaemonReady => "daemon-ready",
            Self::BindingServices => "binding-services",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestratorState::*;

    #[test]
    fn test_hidden_service_path() {
        let path = [
            Idle,
            WorkspaceReady,
            DaemonStarting,
            DaemonReady,
            BindingServices,
            Running,
            ShuttingDown,
            Stopped,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_skips_to_binding() {
        assert!(WorkspaceReady.can_transition_to(BindingServices));
        assert!(Idle.can_transition_to(BindingServices));
        assert!(!Idle.can_transition_to(DaemonStarting));
        assert!(!BindingServices.can_transition_to(DaemonStarting));
    }

    #[test]
    fn test_failed_launch_skips_ready() {
        assert!(DaemonStarting.can_transition_to(BindingServices));
        assert!(!DaemonStarting.can_transition_to(Running));
    }

    #[test]
    fn test_shutdown_from_anywhere_once() {
        for state in [Idle, WorkspaceReady, DaemonStarting, BindingServices, Running] {
            assert!(state.can_transition_to(ShuttingDown));
        }
        assert!(!ShuttingDown.can_transition_to(ShuttingDown));
        assert!(!Stopped.can_transition_to(ShuttingDown));
        assert!(!Stopped.can_transition_to(Running));
    }
}
