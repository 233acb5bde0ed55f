use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncRunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown sync run status: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(Self::Scheduled),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("unknown trigger source: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown log level: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounters {
    pub fetched: i64,
    pub inserted: i64,
    pub updated: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub entity_type: String,
    pub trigger_source: TriggerSource,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: RunCounters,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn start(entity_type: &str, trigger_source: TriggerSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            trigger_source,
            status: SyncRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            counters: RunCounters::default(),
            error_message: None,
        }
    }
}

/// Append-only progress record attached to one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub run_id: Uuid,
    pub level: LogLevel,
    pub step: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            SyncRunStatus::Running,
            SyncRunStatus::Success,
            SyncRunStatus::Partial,
            SyncRunStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SyncRunStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncRunStatus>().is_err());
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!SyncRunStatus::Running.is_terminal());
        assert!(SyncRunStatus::Partial.is_terminal());
    }

    #[test]
    fn log_level_serializes_uppercase() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
    }

    #[test]
    fn new_run_starts_running_with_zero_counters() {
        let run = SyncRun::start("deals", TriggerSource::Scheduled);
        assert_eq!(run.status, SyncRunStatus::Running);
        assert_eq!(run.counters, RunCounters::default());
        assert!(run.finished_at.is_none());
    }
}
