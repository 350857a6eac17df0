//! Check severity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The health verdict of a stage or a whole run.
///
/// Ordered from best to worst, so the aggregate of several severities is
/// simply their maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Target is healthy.
    #[default]
    Up,
    /// Target answers but something is off.
    Degraded,
    /// Target is unavailable or failed an assertion.
    Down,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Degraded => write!(f, "degraded"),
            Self::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "degraded" => Ok(Self::Degraded),
            "down" => Ok(Self::Down),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

impl Severity {
    /// Returns true for `Up`.
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    /// Returns true for `Down`.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        matches!(self, Self::Down)
    }

    /// Folds an iterator of severities into the worst one, `Up` if empty.
    pub fn worst<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        iter.into_iter().max().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Up.to_string(), "up");
        assert_eq!(Severity::Degraded.to_string(), "degraded");
        assert_eq!(Severity::Down.to_string(), "down");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Down > Severity::Degraded);
        assert!(Severity::Degraded > Severity::Up);
        assert_eq!(Severity::Up.max(Severity::Down), Severity::Down);
    }

    #[test]
    fn test_worst() {
        assert_eq!(Severity::worst([]), Severity::Up);
        assert_eq!(
            Severity::worst([Severity::Up, Severity::Degraded, Severity::Up]),
            Severity::Degraded
        );
        assert_eq!(
            Severity::worst([Severity::Down, Severity::Up]),
            Severity::Down
        );
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
        let parsed: Severity = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(parsed, Severity::Down);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("UP".parse::<Severity>().unwrap(), Severity::Up);
        assert!("sideways".parse::<Severity>().is_err());
    }
}
