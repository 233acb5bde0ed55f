use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::crm::query::FetchWindow;

/// How one run decides its fetch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Everything changed since the last successful run.
    #[default]
    Incremental,
    /// Entire upstream collection, watermark ignored.
    Full,
    FromDate(DateTime<Utc>),
    /// Watermark as lower bound, `until` as inclusive upper bound.
    ToDate(DateTime<Utc>),
    LastDuration(Duration),
    /// Same window as `FromDate`, recorded as a deliberate replay.
    RollbackFromDate(DateTime<Utc>),
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::FromDate(_) => "from_date",
            Self::ToDate(_) => "to_date",
            Self::LastDuration(_) => "last_duration",
            Self::RollbackFromDate(_) => "rollback_from_date",
        }
    }

    /// Whether resolving this mode needs the stored watermark.
    pub fn needs_watermark(&self) -> bool {
        matches!(self, Self::Incremental | Self::ToDate(_))
    }

    /// Turn the mode into concrete fetch bounds.
    ///
    /// `baseline` is the watermark (or its fallback) and is only consulted
    /// by modes for which [`needs_watermark`](Self::needs_watermark) is true.
    pub fn resolve(&self, now: DateTime<Utc>, baseline: Option<DateTime<Utc>>) -> FetchWindow {
        match *self {
            Self::Full => FetchWindow::all(),
            Self::Incremental => FetchWindow::since(baseline.unwrap_or(now)),
            Self::FromDate(since) | Self::RollbackFromDate(since) => FetchWindow::since(since),
            Self::ToDate(until) => FetchWindow {
                since: baseline,
                until: Some(until),
            },
            Self::LastDuration(span) => FetchWindow::since(now - span),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental | Self::Full => f.write_str(self.as_str()),
            Self::FromDate(d) | Self::ToDate(d) | Self::RollbackFromDate(d) => {
                write!(f, "{}({})", self.as_str(), d.to_rfc3339())
            }
            Self::LastDuration(span) => write!(f, "{}({}s)", self.as_str(), span.num_seconds()),
        }
    }
}

/// Parse `YYYY-MM-DD` (start of that UTC day) or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("invalid date '{raw}': expected YYYY-MM-DD or RFC 3339"))
}

/// Like [`parse_date`], but a bare date means the last millisecond of that day.
pub fn parse_date_end_of_day(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => {
            let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .ok_or_else(|| "invalid end-of-day time".to_string())?;
            Ok(Utc.from_utc_datetime(&date.and_time(end)))
        }
        Err(_) => parse_date(trimmed),
    }
}

/// Parse a positive span such as `30m`, `12h` or `7d`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let invalid = || format!("invalid duration '{raw}': expected <N>m, <N>h or <N>d");

    let unit = raw.chars().last().ok_or_else(invalid)?;
    let amount: i64 = raw[..raw.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    match unit.to_ascii_lowercase() {
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(invalid()),
    }
}
