use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one day, the unit all day counts are floored to
const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Due dates at most this many days out are "due soon"
const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum FeeStatusKind {
    Unknown,
    Paid,
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl FeeStatusKind {
    pub const ALL: [FeeStatusKind; 6] = [
        FeeStatusKind::Overdue,
        FeeStatusKind::DueToday,
        FeeStatusKind::DueSoon,
        FeeStatusKind::Upcoming,
        FeeStatusKind::Paid,
        FeeStatusKind::Unknown,
    ];

    /// Higher is more urgent. Used to sort rows needing attention first.
    pub fn severity(&self) -> u8 {
        match self {
            FeeStatusKind::Overdue => 5,
            FeeStatusKind::DueToday => 4,
            FeeStatusKind::DueSoon => 3,
            FeeStatusKind::Unknown => 2,
            FeeStatusKind::Upcoming => 1,
            FeeStatusKind::Paid => 0,
        }
    }
}

impl std::fmt::Display for FeeStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeStatusKind::Unknown => write!(f, "Unknown"),
            FeeStatusKind::Paid => write!(f, "Paid"),
            FeeStatusKind::Overdue => write!(f, "Overdue"),
            FeeStatusKind::DueToday => write!(f, "Due Today"),
            FeeStatusKind::DueSoon => write!(f, "Due Soon"),
            FeeStatusKind::Upcoming => write!(f, "Upcoming"),
        }
    }
}

/// Derived billing standing plus the day count that goes with it.
///
/// `days` means "days since payment" for `Paid`, "days late" for `Overdue`,
/// and "days until due" for `DueSoon`/`Upcoming`. It is zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct FeeStatus {
    #[serde(rename = "status")]
    pub kind: FeeStatusKind,
    pub days: u32,
}

impl FeeStatus {
    fn new(kind: FeeStatusKind, days: i64) -> Self {
        Self {
            kind,
            days: u32::try_from(days.max(0)).unwrap_or(u32::MAX),
        }
    }

    pub fn unknown() -> Self {
        Self::new(FeeStatusKind::Unknown, 0)
    }

    /// Human readable text for a status cell
    pub fn label(&self) -> String {
        let days = |n: u32| if n == 1 { "1 day".to_string() } else { format!("{} days", n) };
        match self.kind {
            FeeStatusKind::Unknown => "Unknown".to_string(),
            FeeStatusKind::Paid if self.days == 0 => "Paid today".to_string(),
            FeeStatusKind::Paid => format!("Paid {} ago", days(self.days)),
            FeeStatusKind::Overdue => format!("Overdue by {}", days(self.days)),
            FeeStatusKind::DueToday => "Due today".to_string(),
            FeeStatusKind::DueSoon | FeeStatusKind::Upcoming => {
                format!("Due in {}", days(self.days))
            }
        }
    }
}

/// Parse a billing date as the service sends it.
///
/// Accepts RFC 3339 timestamps, naive timestamps (taken as UTC) and plain
/// `YYYY-MM-DD` dates (midnight UTC). Anything else is treated as absent.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days from `from` to `to`, floored.
fn floor_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(MS_PER_DAY)
}

/// Classify a customer's fee standing.
///
/// A recorded payment wins over a due-date projection unless the due date
/// has since passed. Without a payment, the distance to the due date picks
/// the urgency tier. Total: absent dates fall through to `Unknown`.
pub fn classify(
    next_due: Option<DateTime<Utc>>,
    last_payment: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FeeStatus {
    if let Some(paid_at) = last_payment {
        if let Some(due) = next_due {
            if now > due {
                return FeeStatus::new(FeeStatusKind::Overdue, floor_days(due, now).max(1));
            }
        }
        return FeeStatus::new(FeeStatusKind::Paid, floor_days(paid_at, now));
    }

    let Some(due) = next_due else {
        return FeeStatus::unknown();
    };

    let diff_days = floor_days(now, due);
    if diff_days < 0 {
        FeeStatus::new(FeeStatusKind::Overdue, diff_days.abs())
    } else if diff_days == 0 {
        FeeStatus::new(FeeStatusKind::DueToday, 0)
    } else if diff_days <= DUE_SOON_DAYS {
        FeeStatus::new(FeeStatusKind::DueSoon, diff_days)
    } else {
        FeeStatus::new(FeeStatusKind::Upcoming, diff_days)
    }
}
