use crate::domain::{Achievement, NewEntry, SavingsEntry};
use crate::error::Result;
use rust_decimal::Decimal;

/// Append-only savings ledger.
pub trait LedgerStore {
    /// Appends an entry and returns its id. Ids increase and are never reused.
    fn insert(&self, entry: &NewEntry) -> Result<i64>;

    /// Entries newest first.
    fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<SavingsEntry>>;

    /// Signed sum over every entry.
    fn sum_all(&self) -> Result<Decimal>;
}

/// Append-only record of awarded achievements.
pub trait AchievementLedger {
    fn insert(&self, achievement: &Achievement) -> Result<()>;

    /// Every achievement in award order.
    fn list_all(&self) -> Result<Vec<Achievement>>;
}

/// Groups store writes so they land together or not at all.
///
/// The unit of work covers every store that shares the same backend.
pub trait UnitOfWork {
    /// Runs `f`, keeping its writes only if it returns `Ok`.
    fn in_unit_of_work<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T>;
}

pub trait PreferenceStore {
    fn set_unlocked(&self, theme_id: &str) -> Result<()>;

    /// Makes `theme_id` the only active theme.
    fn set_active(&self, theme_id: &str) -> Result<()>;

    fn get_active(&self) -> Result<Option<String>>;

    fn list_unlocked(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use crate::error::Error;
    use std::cell::{Cell, RefCell};

    /// In-memory implementation of every store, with switchable write failures.
    #[derive(Default)]
    pub struct MemoryStore {
        entries: RefCell<Vec<SavingsEntry>>,
        achievements: RefCell<Vec<Achievement>>,
        unlocked: RefCell<Vec<String>>,
        active: RefCell<Option<String>>,
        pub fail_achievement_writes: Cell<bool>,
        pub fail_ledger_writes: Cell<bool>,
    }

    fn injected(what: &str) -> Error {
        Error::persistence(format!("injected {what} failure"))
    }

    impl MemoryStore {
        pub fn achievement_count(&self) -> usize {
            self.achievements.borrow().len()
        }
    }

    impl UnitOfWork for MemoryStore {
        fn in_unit_of_work<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
            let entries = self.entries.borrow().clone();
            let achievements = self.achievements.borrow().clone();
            let unlocked = self.unlocked.borrow().clone();
            let active = self.active.borrow().clone();

            let out = f();
            if out.is_err() {
                *self.entries.borrow_mut() = entries;
                *self.achievements.borrow_mut() = achievements;
                *self.unlocked.borrow_mut() = unlocked;
                *self.active.borrow_mut() = active;
            }
            out
        }
    }

    impl LedgerStore for MemoryStore {
        fn insert(&self, entry: &NewEntry) -> Result<i64> {
            if self.fail_ledger_writes.get() {
                return Err(injected("ledger write"));
            }
            let mut entries = self.entries.borrow_mut();
            let id = entries.len() as i64 + 1;
            entries.push(SavingsEntry {
                id,
                amount: entry.amount,
                entry_type: entry.entry_type,
                label: entry.label.clone(),
                purpose: entry.purpose.clone(),
                date_entered: Some(entry.date_entered),
                synced: false,
            });
            Ok(id)
        }

        fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<SavingsEntry>> {
            let mut out = self.entries.borrow().clone();
            out.sort_by(|a, b| b.date_entered.cmp(&a.date_entered).then(b.id.cmp(&a.id)));
            Ok(out
                .into_iter()
                .skip(offset.unwrap_or(0))
                .take(limit.unwrap_or(usize::MAX))
                .collect())
        }

        fn sum_all(&self) -> Result<Decimal> {
            self.entries.borrow().iter().try_fold(Decimal::ZERO, |total, e| {
                total
                    .checked_add(e.signed_amount())
                    .ok_or_else(|| Error::persistence(format!("balance overflows at entry {}", e.id)))
            })
        }
    }

    impl AchievementLedger for MemoryStore {
        fn insert(&self, achievement: &Achievement) -> Result<()> {
            if self.fail_achievement_writes.get() {
                return Err(injected("achievement write"));
            }
            let mut all = self.achievements.borrow_mut();
            if all.iter().any(|a| a.key() == achievement.key()) {
                return Err(Error::persistence(format!(
                    "duplicate achievement {} '{}'",
                    achievement.kind, achievement.name
                )));
            }
            all.push(achievement.clone());
            Ok(())
        }

        fn list_all(&self) -> Result<Vec<Achievement>> {
            Ok(self.achievements.borrow().clone())
        }
    }

    impl PreferenceStore for MemoryStore {
        fn set_unlocked(&self, theme_id: &str) -> Result<()> {
            let mut unlocked = self.unlocked.borrow_mut();
            if !unlocked.iter().any(|t| t == theme_id) {
                unlocked.push(theme_id.to_string());
            }
            Ok(())
        }

        fn set_active(&self, theme_id: &str) -> Result<()> {
            *self.active.borrow_mut() = Some(theme_id.to_string());
            Ok(())
        }

        fn get_active(&self) -> Result<Option<String>> {
            Ok(self.active.borrow().clone())
        }

        fn list_unlocked(&self) -> Result<Vec<String>> {
            Ok(self.unlocked.borrow().clone())
        }
    }
}
