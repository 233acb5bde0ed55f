use clap::{ArgGroup, Parser, ValueEnum};

use hubsync_db::records::models::EntityType;
use hubsync_db::sync::models::TriggerSource;

use crate::mode::{parse_date, parse_date_end_of_day, parse_duration, SyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityArg {
    All,
    Contacts,
    Deals,
    Calls,
}

impl EntityArg {
    /// The single selected entity, or `None` for all of them.
    pub fn entity(&self) -> Option<EntityType> {
        match self {
            Self::All => None,
            Self::Contacts => Some(EntityType::Contact),
            Self::Deals => Some(EntityType::Deal),
            Self::Calls => Some(EntityType::Call),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    Scheduled,
    Manual,
}

impl From<TriggerArg> for TriggerSource {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Scheduled => TriggerSource::Scheduled,
            TriggerArg::Manual => TriggerSource::Manual,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "hubsync-ingest")]
#[command(about = "Replicate CRM contacts, deals and calls into the warehouse")]
#[command(group(
    ArgGroup::new("mode")
        .args(["full", "from_date", "to_date", "last", "rollback_from"])
        .multiple(false)
))]
pub struct Args {
    /// Entity type to sync.
    #[arg(long, value_enum, default_value = "all")]
    pub entity: EntityArg,

    /// Fetch the whole collection, ignoring the watermark.
    #[arg(long)]
    pub full: bool,

    /// Lower bound override (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_name = "DATE")]
    pub from_date: Option<String>,

    /// Upper bound; the lower bound stays the watermark.
    #[arg(long, value_name = "DATE")]
    pub to_date: Option<String>,

    /// Look back a fixed span, e.g. 30m, 12h, 7d.
    #[arg(long, value_name = "SPAN")]
    pub last: Option<String>,

    /// Replay everything changed since DATE.
    #[arg(long, value_name = "DATE")]
    pub rollback_from: Option<String>,

    #[arg(long, value_enum, default_value = "manual")]
    pub trigger: TriggerArg,

    /// Create missing tables before syncing.
    #[arg(long)]
    pub ensure_schema: bool,
}

impl Args {
    pub fn mode(&self) -> Result<SyncMode, String> {
        if self.full {
            return Ok(SyncMode::Full);
        }
        if let Some(raw) = &self.from_date {
            return parse_date(raw).map(SyncMode::FromDate);
        }
        if let Some(raw) = &self.to_date {
            return parse_date_end_of_day(raw).map(SyncMode::ToDate);
        }
        if let Some(raw) = &self.last {
            return parse_duration(raw).map(SyncMode::LastDuration);
        }
        if let Some(raw) = &self.rollback_from {
            return parse_date(raw).map(SyncMode::RollbackFromDate);
        }
        Ok(SyncMode::Incremental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("hubsync-ingest").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_incremental_for_all_entities() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode().unwrap(), SyncMode::Incremental);
        assert_eq!(args.entity.entity(), None);
        assert_eq!(TriggerSource::from(args.trigger), TriggerSource::Manual);
        assert!(!args.ensure_schema);
    }

    #[test]
    fn single_entity_and_full_mode() {
        let args = parse(&["--entity", "deals", "--full", "--trigger", "scheduled"]).unwrap();
        assert_eq!(args.entity.entity(), Some(EntityType::Deal));
        assert_eq!(args.mode().unwrap(), SyncMode::Full);
        assert_eq!(TriggerSource::from(args.trigger), TriggerSource::Scheduled);
    }

    #[test]
    fn mode_flags_are_mutually_exclusive() {
        assert!(parse(&["--full", "--last", "7d"]).is_err());
        assert!(parse(&["--from-date", "2026-10-01", "--rollback-from", "2026-09-01"]).is_err());
    }

    #[test]
    fn last_parses_duration() {
        let args = parse(&["--last", "12h"]).unwrap();
        assert_eq!(args.mode().unwrap(), SyncMode::LastDuration(Duration::hours(12)));
    }

    #[test]
    fn to_date_is_end_of_day() {
        let args = parse(&["--to-date", "2026-10-01"]).unwrap();
        match args.mode().unwrap() {
            SyncMode::ToDate(until) => assert_eq!(until.to_rfc3339(), "2026-10-01T23:59:59.999+00:00"),
            other => panic!("expected ToDate, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_is_reported_by_mode() {
        let args = parse(&["--rollback-from", "last tuesday"]).unwrap();
        assert!(args.mode().is_err());
    }

    #[test]
    fn unknown_entity_is_rejected() {
        assert!(parse(&["--entity", "tickets"]).is_err());
    }
}
