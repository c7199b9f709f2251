use chrono::{DateTime, Utc};
use serde::Serialize;

use super::FeeStatusKind;
use crate::models::Customer;

/// Per-status counts over a set of customers, for dashboard tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeeSummary {
    pub unknown: usize,
    pub paid: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub due_soon: usize,
    pub upcoming: usize,
}

impl FeeSummary {
    pub fn tally<'a>(customers: impl IntoIterator<Item = &'a Customer>, now: DateTime<Utc>) -> Self {
        let mut summary = Self::default();
        for customer in customers {
            summary.record(customer.fee_status(now).kind);
        }
        summary
    }

    fn record(&mut self, kind: FeeStatusKind) {
        match kind {
            FeeStatusKind::Unknown => self.unknown += 1,
            FeeStatusKind::Paid => self.paid += 1,
            FeeStatusKind::Overdue => self.overdue += 1,
            FeeStatusKind::DueToday => self.due_today += 1,
            FeeStatusKind::DueSoon => self.due_soon += 1,
            FeeStatusKind::Upcoming => self.upcoming += 1,
        }
    }

    pub fn count(&self, kind: FeeStatusKind) -> usize {
        match kind {
            FeeStatusKind::Unknown => self.unknown,
            FeeStatusKind::Paid => self.paid,
            FeeStatusKind::Overdue => self.overdue,
            FeeStatusKind::DueToday => self.due_today,
            FeeStatusKind::DueSoon => self.due_soon,
            FeeStatusKind::Upcoming => self.upcoming,
        }
    }

    pub fn total(&self) -> usize {
        FeeStatusKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    /// Customers whose fee is late or due today
    pub fn needs_attention(&self) -> usize {
        self.overdue + self.due_today
    }
}
