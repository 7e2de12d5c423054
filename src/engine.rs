use crate::domain::{Achievement, AchievementKey, AchievementKind, EntryType, NewEntry, SavingsEntry};
use crate::error::{Error, Result};
use crate::stats::Stats;
use crate::store::{AchievementLedger, LedgerStore, PreferenceStore, UnitOfWork};
use crate::tiers::{DEFAULT_THEME, Rules, Tier};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct TierStatus {
    /// Position of `tier` in the rule table, starting at 0.
    pub level: usize,
    pub tier: Tier,
    pub next: Option<Tier>,
    /// Percent of the way from `tier` to `next`, in `[0, 100]`.
    pub progress: Decimal,
    pub amount_to_next: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub balance: Decimal,
    pub tier: TierStatus,
    pub newly_awarded: Vec<Achievement>,
    pub theme_unlocks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub entry_id: i64,
    pub new_achievements: Vec<Achievement>,
    pub unlocked_themes: Vec<String>,
}

/// Where `balance` sits in the tier table.
///
/// Fails only when the distance to the next tier does not fit in a `Decimal`.
pub fn tier_status(rules: &Rules, balance: Decimal) -> Result<TierStatus> {
    let tiers = rules.tiers();
    let level = rules.tier_index_for(balance);
    let tier = tiers[level].clone();
    let next = tiers.get(level + 1).cloned();

    let (progress, amount_to_next) = match &next {
        None => (Decimal::ONE_HUNDRED, None),
        Some(next) => {
            let to_go = next
                .threshold
                .checked_sub(balance)
                .ok_or_else(|| out_of_range(balance))?;
            let progress = progress_between(tier.threshold, next.threshold, balance)
                .ok_or_else(|| out_of_range(balance))?;
            (progress, Some(to_go.max(Decimal::ZERO)))
        }
    };

    Ok(TierStatus {
        level,
        tier,
        next,
        progress,
        amount_to_next,
    })
}

/// Percent of the way from `from` to `to`, clamped to `[0, 100]`.
fn progress_between(from: Decimal, to: Decimal, balance: Decimal) -> Option<Decimal> {
    if balance <= from {
        return Some(Decimal::ZERO);
    }
    let done = balance.checked_sub(from)?;
    let span = to.checked_sub(from)?;
    let percent = done.checked_div(span)?.checked_mul(Decimal::ONE_HUNDRED)?;
    Some(percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
}

fn out_of_range(balance: Decimal) -> Error {
    Error::persistence(format!("balance {balance} is out of range for the tier table"))
}

/// Works out which tiers and milestones `balance` reaches that are not in `awarded`.
///
/// Awards depend only on the balance, never on the change that produced it, so a
/// threshold that was already awarded is never awarded again. The base tier is held
/// from the start and is not an achievement. Tiers come first, then milestones, each
/// in ascending threshold order.
pub fn evaluate(
    rules: &Rules,
    balance: Decimal,
    awarded: &HashSet<AchievementKey>,
    at: DateTime<Utc>,
) -> Result<Evaluation> {
    let mut newly_awarded = Vec::new();
    let mut theme_unlocks = Vec::new();

    let award = |kind: AchievementKind, name: &str| Achievement {
        kind,
        name: name.to_string(),
        total_savings_at_achievement: balance,
        achieved_at: at,
    };

    for tier in rules.tiers().iter().skip(1) {
        if tier.threshold > balance {
            break;
        }
        if awarded.contains(&AchievementKey::new(AchievementKind::Tier, tier.name.as_str())) {
            continue;
        }
        newly_awarded.push(award(AchievementKind::Tier, &tier.name));
        if let Some(theme) = &tier.theme {
            theme_unlocks.push(theme.clone());
        }
    }

    for milestone in rules.milestones() {
        if milestone.threshold > balance {
            break;
        }
        let key = AchievementKey::new(AchievementKind::Milestone, milestone.name.as_str());
        if !awarded.contains(&key) {
            newly_awarded.push(award(AchievementKind::Milestone, &milestone.name));
        }
    }

    Ok(Evaluation {
        balance,
        tier: tier_status(rules, balance)?,
        newly_awarded,
        theme_unlocks,
    })
}

/// Savings engine over injected stores.
///
/// The engine owns no state of its own: the balance is always re-derived from the
/// ledger and the awarded set from the achievement ledger. Every write goes through
/// the ledger's unit of work, which must also cover the other two stores.
pub struct Engine<'a, L, A, P> {
    rules: &'a Rules,
    ledger: &'a L,
    achievements: &'a A,
    prefs: &'a P,
}

impl<'a, L, A, P> Engine<'a, L, A, P>
where
    L: LedgerStore + UnitOfWork,
    A: AchievementLedger,
    P: PreferenceStore,
{
    pub fn new(rules: &'a Rules, ledger: &'a L, achievements: &'a A, prefs: &'a P) -> Self {
        Self {
            rules,
            ledger,
            achievements,
            prefs,
        }
    }

    pub fn add_entry(
        &self,
        amount: Decimal,
        entry_type: EntryType,
        label: Option<String>,
        purpose: Option<String>,
    ) -> Result<EntryOutcome> {
        self.add_entry_at(amount, entry_type, label, purpose, Utc::now())
    }

    /// Appends an entry dated `date_entered`, then awards whatever the new balance reaches.
    ///
    /// Validation happens before any write. The entry, its achievements and its theme
    /// unlocks are written in one unit of work, so a failure leaves every store as it was.
    pub fn add_entry_at(
        &self,
        amount: Decimal,
        entry_type: EntryType,
        label: Option<String>,
        purpose: Option<String>,
        date_entered: DateTime<Utc>,
    ) -> Result<EntryOutcome> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be greater than 0, got {amount}"
            )));
        }

        let entry = NewEntry {
            amount,
            entry_type,
            label: non_blank(label),
            purpose: non_blank(purpose),
            date_entered,
        };

        self.ledger.in_unit_of_work(|| {
            self.check_fits(&entry)?;
            let entry_id = self.ledger.insert(&entry)?;
            info!(entry_id, %entry_type, %amount, "recorded savings entry");

            let evaluation = self.award_current(Utc::now())?;
            Ok(EntryOutcome {
                entry_id,
                new_achievements: evaluation.newly_awarded,
                unlocked_themes: evaluation.theme_unlocks,
            })
        })
    }

    /// Rejects an entry whose resulting balance could not be represented or placed in a tier.
    fn check_fits(&self, entry: &NewEntry) -> Result<()> {
        let too_large = || {
            Error::Validation(format!(
                "{} of {} would take the balance out of range",
                entry.entry_type, entry.amount
            ))
        };
        let projected = self
            .balance()?
            .checked_add(entry.entry_type.signed(entry.amount))
            .ok_or_else(too_large)?;
        tier_status(self.rules, projected).map_err(|_| too_large())?;
        Ok(())
    }

    pub fn balance(&self) -> Result<Decimal> {
        self.ledger.sum_all()
    }

    pub fn current_tier(&self) -> Result<TierStatus> {
        tier_status(self.rules, self.balance()?)
    }

    /// Re-evaluates the current balance. Running it again without new entries awards nothing.
    pub fn check_and_award_achievements(&self) -> Result<Evaluation> {
        self.ledger.in_unit_of_work(|| self.award_current(Utc::now()))
    }

    fn award_current(&self, at: DateTime<Utc>) -> Result<Evaluation> {
        let balance = self.balance()?;
        let awarded: HashSet<AchievementKey> = self
            .achievements
            .list_all()?
            .iter()
            .map(Achievement::key)
            .collect();

        let evaluation = evaluate(self.rules, balance, &awarded, at)?;
        debug!(
            %balance,
            tier = %evaluation.tier.tier.name,
            new = evaluation.newly_awarded.len(),
            "evaluated balance"
        );

        for achievement in &evaluation.newly_awarded {
            self.achievements.insert(achievement)?;
            info!(kind = %achievement.kind, name = %achievement.name, "awarded achievement");
        }
        for theme in &evaluation.theme_unlocks {
            self.prefs.set_unlocked(theme)?;
            info!(theme = %theme, "unlocked theme");
        }
        Ok(evaluation)
    }

    pub fn achievements(&self) -> Result<Vec<Achievement>> {
        self.achievements.list_all()
    }

    pub fn entries(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<SavingsEntry>> {
        self.ledger.list(limit, offset)
    }

    pub fn unlocked_themes(&self) -> Result<Vec<String>> {
        let mut themes = vec![DEFAULT_THEME.to_string()];
        for theme in self.prefs.list_unlocked()? {
            if !themes.contains(&theme) {
                themes.push(theme);
            }
        }
        Ok(themes)
    }

    pub fn active_theme(&self) -> Result<String> {
        Ok(self
            .prefs
            .get_active()?
            .unwrap_or_else(|| DEFAULT_THEME.to_string()))
    }

    pub fn activate_theme(&self, theme_id: &str) -> Result<()> {
        if !self.unlocked_themes()?.iter().any(|t| t == theme_id) {
            return Err(Error::NotUnlocked(theme_id.to_string()));
        }
        self.ledger.in_unit_of_work(|| self.prefs.set_active(theme_id))?;
        info!(theme = theme_id, "activated theme");
        Ok(())
    }

    pub fn stats(&self) -> Result<Stats> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<Stats> {
        let entries = self.ledger.list(None, None)?;
        Stats::from_entries(&entries, now)
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
