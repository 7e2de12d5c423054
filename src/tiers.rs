use crate::error::{Error, Result};
use rust_decimal::Decimal;

/// Theme that is always available and used while no theme is active.
pub const DEFAULT_THEME: &str = "classic";

#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    pub name: String,
    /// Minimum balance required to hold this tier.
    pub threshold: Decimal,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub name: String,
    pub threshold: Decimal,
}

/// Tier and milestone tables the engine evaluates a balance against.
///
/// Tiers are strictly ascending and start at zero, so every non-negative balance
/// maps to exactly one tier. Milestones are independent of tiers.
#[derive(Debug, Clone)]
pub struct Rules {
    tiers: Vec<Tier>,
    milestones: Vec<Milestone>,
}

const STANDARD_TIERS: &[(&str, i64, Option<&str>)] = &[
    ("Starter", 0, None),
    ("Bronze Saver", 100, Some("bronze")),
    ("Silver Saver", 500, Some("silver")),
    ("Gold Saver", 1000, Some("gold")),
    ("Platinum Saver", 2500, Some("platinum")),
    ("Diamond Saver", 5000, Some("diamond")),
    ("Elite Saver", 10000, Some("elite")),
];

const STANDARD_MILESTONES: &[(&str, i64)] = &[
    ("First Steps", 50),
    ("Piggy Bank", 250),
    ("Four Figures", 1000),
    ("Nest Egg", 5000),
    ("Five Figures", 10000),
    ("Savings Legend", 25000),
];

impl Rules {
    pub fn new(tiers: Vec<Tier>, milestones: Vec<Milestone>) -> Result<Self> {
        let Some(first) = tiers.first() else {
            return Err(Error::InvalidRules("at least one tier is required".into()));
        };
        if first.threshold != Decimal::ZERO {
            return Err(Error::InvalidRules(format!(
                "first tier '{}' must start at 0, not {}",
                first.name, first.threshold
            )));
        }
        for pair in tiers.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(Error::InvalidRules(format!(
                    "tier '{}' ({}) must be above '{}' ({})",
                    pair[1].name, pair[1].threshold, pair[0].name, pair[0].threshold
                )));
            }
        }
        for pair in milestones.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(Error::InvalidRules(format!(
                    "milestone '{}' must be above '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }
        Ok(Self { tiers, milestones })
    }

    pub fn standard() -> Result<Self> {
        let tiers = STANDARD_TIERS
            .iter()
            .map(|(name, threshold, theme)| Tier {
                name: name.to_string(),
                threshold: Decimal::from(*threshold),
                theme: theme.map(str::to_string),
            })
            .collect();
        let milestones = STANDARD_MILESTONES
            .iter()
            .map(|(name, threshold)| Milestone {
                name: name.to_string(),
                threshold: Decimal::from(*threshold),
            })
            .collect();
        Self::new(tiers, milestones)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Index of the highest tier whose threshold is at or below `balance`.
    ///
    /// Balances below the first threshold still map to the first tier.
    pub fn tier_index_for(&self, balance: Decimal) -> usize {
        self.tiers
            .iter()
            .rposition(|t| t.threshold <= balance)
            .unwrap_or(0)
    }
}

/// What a tier level grants outside of the savings ledger itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPerks {
    pub level: usize,
    pub basic_ai_chat: bool,
    pub premium_themes: bool,
    pub advanced_insights: bool,
    pub export_data: bool,
    pub unlimited_ai: bool,
    pub priority_support: bool,
    /// `None` means unlimited.
    pub ai_requests_per_day: Option<u32>,
    pub insights_per_month: Option<u32>,
}

const BRONZE: usize = 1;
const SILVER: usize = 2;
const GOLD: usize = 3;
const PLATINUM: usize = 4;

pub fn has_access(level: usize, required_level: usize) -> bool {
    level >= required_level
}

pub fn perks_for_level(level: usize) -> TierPerks {
    let (ai_requests_per_day, insights_per_month) = match level {
        0 => (Some(3), Some(1)),
        BRONZE => (Some(10), Some(5)),
        SILVER => (Some(25), Some(15)),
        GOLD => (Some(50), Some(30)),
        _ => (None, None),
    };

    TierPerks {
        level,
        basic_ai_chat: has_access(level, BRONZE),
        premium_themes: has_access(level, SILVER),
        advanced_insights: has_access(level, GOLD),
        export_data: has_access(level, GOLD),
        unlimited_ai: has_access(level, PLATINUM),
        priority_support: has_access(level, PLATINUM),
        ai_requests_per_day,
        insights_per_month,
    }
}
