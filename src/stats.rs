use crate::domain::SavingsEntry;
use crate::error::{Error, Result};
use chrono::{DateTime, Days, Utc};
use rust_decimal::Decimal;

pub const WEEK_DAYS: u32 = 7;
pub const MONTH_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total_savings: Decimal,
    pub total_entries: usize,
    pub average_entry: Decimal,
    pub weekly_average: Decimal,
    pub monthly_average: Decimal,
}

impl Stats {
    /// Aggregates the whole ledger as seen at `now`.
    ///
    /// Windowed averages divide by the full window length, not by the number of
    /// entries in it. Undated entries count toward the totals only.
    pub fn from_entries(entries: &[SavingsEntry], now: DateTime<Utc>) -> Result<Self> {
        // Summed in insertion order, the order the ledger balance was built in.
        let mut by_id: Vec<&SavingsEntry> = entries.iter().collect();
        by_id.sort_by_key(|e| e.id);
        let total_savings = signed_sum(by_id)?;

        let total_entries = entries.len();
        let average_entry = if total_entries == 0 {
            Decimal::ZERO
        } else {
            divide(total_savings, Decimal::from(total_entries))?
        };

        Ok(Self {
            total_savings,
            total_entries,
            average_entry,
            weekly_average: window_average(entries, now, WEEK_DAYS)?,
            monthly_average: window_average(entries, now, MONTH_DAYS)?,
        })
    }
}

/// Signed sum of entries dated within the `days` calendar days ending today, over `days`.
fn window_average(entries: &[SavingsEntry], now: DateTime<Utc>, days: u32) -> Result<Decimal> {
    let today = now.date_naive();
    let Some(start) = today.checked_sub_days(Days::new(u64::from(days.saturating_sub(1)))) else {
        return Ok(Decimal::ZERO);
    };

    let sum = signed_sum(entries.iter().filter(|e| {
        e.date_entered
            .map(|d| d.date_naive())
            .is_some_and(|day| day >= start && day <= today)
    }))?;

    divide(sum, Decimal::from(days))
}

fn signed_sum<'a>(entries: impl IntoIterator<Item = &'a SavingsEntry>) -> Result<Decimal> {
    entries.into_iter().try_fold(Decimal::ZERO, |total, e| {
        total
            .checked_add(e.signed_amount())
            .ok_or_else(|| Error::persistence(format!("savings total overflows at entry {}", e.id)))
    })
}

fn divide(sum: Decimal, count: Decimal) -> Result<Decimal> {
    sum.checked_div(count)
        .ok_or_else(|| Error::persistence(format!("cannot divide {sum} by {count}")))
}
