use crate::error::Error;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Deposit,
    Withdrawal,
    Adjustment,
    Transfer,
}

impl EntryType {
    pub const ALL: [EntryType; 4] = [
        EntryType::Deposit,
        EntryType::Withdrawal,
        EntryType::Adjustment,
        EntryType::Transfer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Withdrawal => "withdrawal",
            EntryType::Adjustment => "adjustment",
            EntryType::Transfer => "transfer",
        }
    }

    /// Applies the direction of this entry type to a positive magnitude.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            EntryType::Deposit | EntryType::Adjustment => amount,
            EntryType::Withdrawal | EntryType::Transfer => -amount,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown entry type '{s}' (expected deposit, withdrawal, adjustment or transfer)"
                ))
            })
    }
}

/// An entry as handed to the ledger store, before it has an id.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub label: Option<String>,
    pub purpose: Option<String>,
    pub date_entered: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SavingsEntry {
    pub id: i64,
    /// Positive magnitude; direction comes from `entry_type`.
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub label: Option<String>,
    pub purpose: Option<String>,
    /// `None` when the stored timestamp is missing or could not be parsed.
    pub date_entered: Option<DateTime<Utc>>,
    pub synced: bool,
}

impl SavingsEntry {
    pub fn signed_amount(&self) -> Decimal {
        self.entry_type.signed(self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AchievementKind {
    Tier,
    Milestone,
}

impl AchievementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AchievementKind::Tier => "tier",
            AchievementKind::Milestone => "milestone",
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier" => Ok(AchievementKind::Tier),
            "milestone" => Ok(AchievementKind::Milestone),
            other => Err(Error::Validation(format!(
                "unknown achievement type '{other}'"
            ))),
        }
    }
}

/// Identity of an achievement. A key is awarded at most once per ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AchievementKey {
    pub kind: AchievementKind,
    pub name: String,
}

impl AchievementKey {
    pub fn new(kind: AchievementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub kind: AchievementKind,
    pub name: String,
    /// Balance at the moment the achievement was awarded.
    pub total_savings_at_achievement: Decimal,
    pub achieved_at: DateTime<Utc>,
}

impl Achievement {
    pub fn key(&self) -> AchievementKey {
        AchievementKey::new(self.kind, self.name.clone())
    }
}
