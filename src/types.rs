// src/types.rs

//! Value types that decide scheduling order.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Urgency of a task, ordered from most to least urgent.
///
/// The derived `Ord` follows declaration order, so `Highest < High < ... < Idle`:
/// a *smaller* priority runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    Normal,
    Low,
    Lower,
    Idle,
}

impl Priority {
    /// All priorities, most urgent first.
    pub const ALL: [Priority; 6] = [
        Priority::Highest,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Lower,
        Priority::Idle,
    ];

    /// `true` if `self` should run before `other`.
    pub fn is_more_urgent_than(self, other: Priority) -> bool {
        self < other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Lower => "lower",
            Priority::Idle => "idle",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "invalid priority: {wanted} (expected one of highest, high, normal, low, lower, idle)"
                )
            })
    }
}

/// What happens to a running task when a more urgent task becomes runnable.
///
/// - `Forbidden`: the task is never preempted; it keeps the floor until it is
///   done, even across its own suspension points.
/// - `Resume` (default): the task is paused and later continues from the
///   suspension point where it was preempted.
/// - `Restart`: the task's progress is discarded (its cleanup runs) and its
///   body starts over the next time it is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPolicy {
    Forbidden,
    #[default]
    Resume,
    Restart,
}

impl InterruptPolicy {
    pub fn allows_interruption(self) -> bool {
        !matches!(self, InterruptPolicy::Forbidden)
    }
}

impl fmt::Display for InterruptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterruptPolicy::Forbidden => "forbidden",
            InterruptPolicy::Resume => "resume",
            InterruptPolicy::Restart => "restart",
        };
        f.write_str(s)
    }
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forbidden" => Ok(InterruptPolicy::Forbidden),
            "resume" => Ok(InterruptPolicy::Resume),
            "restart" => Ok(InterruptPolicy::Restart),
            other => Err(format!(
                "invalid interrupt policy: {other} (expected \"forbidden\", \"resume\" or \"restart\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_order_from_most_to_least_urgent() {
        let mut shuffled = vec![
            Priority::Idle,
            Priority::Normal,
            Priority::Highest,
            Priority::Lower,
            Priority::High,
            Priority::Low,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Priority::ALL.to_vec());
        assert!(Priority::High.is_more_urgent_than(Priority::Normal));
        assert!(!Priority::Normal.is_more_urgent_than(Priority::Normal));
    }

    #[test]
    fn parses_priority_and_policy_case_insensitively() {
        assert_eq!(" High ".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("RESTART".parse::<InterruptPolicy>(), Ok(InterruptPolicy::Restart));
        assert!("urgent".parse::<Priority>().is_err());
        assert!("pause".parse::<InterruptPolicy>().is_err());
    }

    #[test]
    fn resume_is_the_default_policy() {
        assert_eq!(InterruptPolicy::default(), InterruptPolicy::Resume);
        assert!(!InterruptPolicy::Forbidden.allows_interruption());
    }
}
