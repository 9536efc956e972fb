// View filtering for tasks

use crate::models::Task;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which tasks the view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Active => write!(f, "active"),
            Filter::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for Filter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(eyre!("Unknown filter: {} (expected all, active or completed)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(completed: bool) -> Task {
        let mut t = Task::new("t".to_string());
        t.completed = completed;
        t
    }

    #[test]
    fn test_filter_matches() {
        let open = task(false);
        let done = task(true);

        assert!(Filter::All.matches(&open));
        assert!(Filter::All.matches(&done));
        assert!(Filter::Active.matches(&open));
        assert!(!Filter::Active.matches(&done));
        assert!(!Filter::Completed.matches(&open));
        assert!(Filter::Completed.matches(&done));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("all".parse::<Filter>().unwrap(), Filter::All);
        assert_eq!("Active".parse::<Filter>().unwrap(), Filter::Active);
        assert_eq!(" completed ".parse::<Filter>().unwrap(), Filter::Completed);
        assert!("done".parse::<Filter>().is_err());
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::All.to_string(), "all");
        assert_eq!(Filter::Completed.to_string(), "completed");
        assert_eq!(Filter::default(), Filter::All);
    }
}
