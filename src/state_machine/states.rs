use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single wave, cluster, bundle or app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Built but not yet reached by the run
    #[default]
    Pending,
    /// Passed its start boundary and is doing work
    Deploying,
    Completed,
    Failed,
    /// Observed the cancellation flag at its start boundary
    Cancelled,
}

impl EntityState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Legal edges: pending -> deploying | cancelled, deploying -> any terminal state
    pub fn can_transition_to(&self, next: EntityState) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Deploying | Self::Cancelled),
            Self::Deploying => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Deploying => write!(f, "deploying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for EntityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "deploying" => Ok(Self::Deploying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid entity state: {s}")),
        }
    }
}

/// Release-level lifecycle
///
/// `Terminated` and `TimedOut` are never produced by the engine itself; they only
/// appear once the hosting runtime reports an externally forced end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Terminated,
    TimedOut,
}

impl ReleaseState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn can_transition_to(&self, next: ReleaseState) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Failed),
            Self::InProgress => matches!(next, Self::Completed | Self::Failed | Self::Cancelled),
            _ => false,
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Terminated => write!(f, "terminated"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl std::str::FromStr for ReleaseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "terminated" => Ok(Self::Terminated),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("Invalid release state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_state_terminal_check() {
        assert!(EntityState::Completed.is_terminal());
        assert!(EntityState::Failed.is_terminal());
        assert!(EntityState::Cancelled.is_terminal());
        assert!(!EntityState::Pending.is_terminal());
        assert!(!EntityState::Deploying.is_terminal());
    }

    #[test]
    fn test_entity_transitions() {
        assert!(EntityState::Pending.can_transition_to(EntityState::Deploying));
        assert!(EntityState::Pending.can_transition_to(EntityState::Cancelled));
        assert!(!EntityState::Pending.can_transition_to(EntityState::Completed));
        assert!(EntityState::Deploying.can_transition_to(EntityState::Failed));
        assert!(!EntityState::Completed.can_transition_to(EntityState::Deploying));
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(ReleaseState::InProgress.to_string(), "in_progress");
        assert_eq!("timed_out".parse::<ReleaseState>().unwrap(), ReleaseState::TimedOut);
        assert_eq!(EntityState::Deploying.to_string(), "deploying");
        assert!("bogus".parse::<EntityState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&ReleaseState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let state: EntityState = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(state, EntityState::Cancelled);
    }
}
