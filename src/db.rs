use crate::config::{AppPaths, profile_slug};
use crate::domain::{Achievement, AchievementKind, EntryType, NewEntry, SavingsEntry};
use crate::error::{self, Error};
use crate::store::{AchievementLedger, LedgerStore, PreferenceStore, UnitOfWork};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(paths: &AppPaths, profile: &str) -> Result<(Self, PathBuf)> {
        let slug = profile_slug(profile);
        let profile_dir = paths.profiles_dir().join(slug);
        fs::create_dir_all(&profile_dir)
            .with_context(|| format!("Failed to create profile dir {}", profile_dir.display()))?;

        let db_path = profile_dir.join("buddy.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open DB {}", db_path.display()))?;

        let db = Self { conn };
        db.migrate()?;
        Ok((db, db_path))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS savings_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount TEXT NOT NULL,
                entry_type TEXT NOT NULL,
                label TEXT,
                purpose TEXT,
                date_entered TEXT,
                synced INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_entries_date ON savings_entries(date_entered);

            CREATE TABLE IF NOT EXISTS achievements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                achievement_type TEXT NOT NULL,
                achievement_name TEXT NOT NULL,
                total_savings_at_achievement TEXT NOT NULL,
                achieved_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_achievements_key
                ON achievements(achievement_type, achievement_name);

            CREATE TABLE IF NOT EXISTS theme_preferences (
                theme_id TEXT PRIMARY KEY,
                unlocked_at TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS active_theme (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                theme_id TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl UnitOfWork for Db {
    /// One SQLite transaction; dropping it uncommitted rolls every store back.
    fn in_unit_of_work<T>(&self, f: impl FnOnce() -> error::Result<T>) -> error::Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f()?;
        tx.commit()?;
        Ok(out)
    }
}

fn sql_count(n: Option<usize>, default: i64) -> i64 {
    n.map_or(default, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn parse_decimal(raw: &str, what: &str) -> error::Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| Error::persistence(format!("invalid {what} '{raw}': {e}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite CURRENT_TIMESTAMP format, written by older tools.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl LedgerStore for Db {
    fn insert(&self, entry: &NewEntry) -> error::Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO savings_entries (amount, entry_type, label, purpose, date_entered, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            "#,
            params![
                entry.amount.to_string(),
                entry.entry_type.as_str(),
                entry.label,
                entry.purpose,
                entry.date_entered.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list(&self, limit: Option<usize>, offset: Option<usize>) -> error::Result<Vec<SavingsEntry>> {
        // julianday() reads both RFC3339 and the older space-separated format and
        // yields NULL for anything else, which sorts those rows last.
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, amount, entry_type, label, purpose, date_entered, synced
            FROM savings_entries
            ORDER BY julianday(date_entered) IS NULL, julianday(date_entered) DESC, id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let rows = stmt.query_map(params![sql_count(limit, -1), sql_count(offset, 0)], |row| {
            let id: i64 = row.get(0)?;
            let amount: String = row.get(1)?;
            let entry_type: String = row.get(2)?;
            let label: Option<String> = row.get(3)?;
            let purpose: Option<String> = row.get(4)?;
            let date_entered: Option<String> = row.get(5)?;
            let synced: bool = row.get(6)?;
            Ok((id, amount, entry_type, label, purpose, date_entered, synced))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, amount, entry_type, label, purpose, date_raw, synced) = row?;
            let amount = parse_decimal(&amount, "amount")?;
            let entry_type = entry_type.parse::<EntryType>().map_err(Error::persistence)?;
            let date_entered = date_raw.as_deref().and_then(parse_timestamp);
            if date_entered.is_none() {
                warn!(id, date = ?date_raw, "savings entry has no usable date");
            }
            out.push(SavingsEntry {
                id,
                amount,
                entry_type,
                label,
                purpose,
                date_entered,
                synced,
            });
        }
        Ok(out)
    }

    fn sum_all(&self) -> error::Result<Decimal> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, entry_type, amount FROM savings_entries ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let entry_type: String = row.get(1)?;
            let amount: String = row.get(2)?;
            Ok((id, entry_type, amount))
        })?;

        let mut total = Decimal::ZERO;
        for row in rows {
            let (id, entry_type, amount) = row?;
            let entry_type = entry_type.parse::<EntryType>().map_err(Error::persistence)?;
            let signed = entry_type.signed(parse_decimal(&amount, "amount")?);
            total = total
                .checked_add(signed)
                .ok_or_else(|| Error::persistence(format!("balance overflows at entry {id}")))?;
        }
        Ok(total)
    }
}

impl AchievementLedger for Db {
    fn insert(&self, achievement: &Achievement) -> error::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO achievements (achievement_type, achievement_name, total_savings_at_achievement, achieved_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                achievement.kind.as_str(),
                achievement.name,
                achievement.total_savings_at_achievement.to_string(),
                achievement.achieved_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_all(&self) -> error::Result<Vec<Achievement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT achievement_type, achievement_name, total_savings_at_achievement, achieved_at
            FROM achievements
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            let name: String = row.get(1)?;
            let total: String = row.get(2)?;
            let achieved_at: String = row.get(3)?;
            Ok((kind, name, total, achieved_at))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (kind, name, total, achieved_raw) = row?;
            let kind = kind
                .parse::<AchievementKind>()
                .map_err(Error::persistence)?;
            let achieved_at = parse_timestamp(&achieved_raw).ok_or_else(|| {
                Error::persistence(format!("invalid achieved_at '{achieved_raw}'"))
            })?;
            out.push(Achievement {
                kind,
                name,
                total_savings_at_achievement: parse_decimal(&total, "achievement balance")?,
                achieved_at,
            });
        }
        Ok(out)
    }
}

impl PreferenceStore for Db {
    fn set_unlocked(&self, theme_id: &str) -> error::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO theme_preferences (theme_id, unlocked_at, is_active)
            VALUES (?1, ?2, 0)
            ON CONFLICT(theme_id) DO NOTHING
            "#,
            params![theme_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn set_active(&self, theme_id: &str) -> error::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO active_theme (slot, theme_id) VALUES (0, ?1)
            ON CONFLICT(slot) DO UPDATE SET theme_id = excluded.theme_id
            "#,
            params![theme_id],
        )?;
        self.conn.execute(
            "UPDATE theme_preferences SET is_active = (theme_id = ?1)",
            params![theme_id],
        )?;
        Ok(())
    }

    fn get_active(&self) -> error::Result<Option<String>> {
        let active = self
            .conn
            .query_row(
                "SELECT theme_id FROM active_theme WHERE slot = 0",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(active)
    }

    fn list_unlocked(&self) -> error::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT theme_id FROM theme_preferences ORDER BY unlocked_at ASC, theme_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::tiers::Rules;
    use rust_decimal_macros::dec;

    fn new_entry(amount: Decimal, entry_type: EntryType, date: DateTime<Utc>) -> NewEntry {
        NewEntry {
            amount,
            entry_type,
            label: Some("jar".to_string()),
            purpose: None,
            date_entered: date,
        }
    }

    #[test]
    fn entries_round_trip_newest_first_with_paging() {
        let db = Db::open_in_memory().unwrap();
        let base = Utc::now();
        for (i, amount) in [dec!(10), dec!(20), dec!(30)].into_iter().enumerate() {
            let date = base + chrono::Duration::minutes(i as i64);
            LedgerStore::insert(&db, &new_entry(amount, EntryType::Deposit, date)).unwrap();
        }

        let all = db.list(None, None).unwrap();
        let amounts: Vec<_> = all.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![dec!(30), dec!(20), dec!(10)]);
        assert_eq!(all[0].label.as_deref(), Some("jar"));
        assert!(!all[0].synced);

        let page = db.list(Some(1), Some(1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].amount, dec!(20));
    }

    #[test]
    fn sum_all_applies_entry_direction() {
        let db = Db::open_in_memory().unwrap();
        let now = Utc::now();
        LedgerStore::insert(&db, &new_entry(dec!(100), EntryType::Deposit, now)).unwrap();
        LedgerStore::insert(&db, &new_entry(dec!(12.25), EntryType::Withdrawal, now)).unwrap();
        LedgerStore::insert(&db, &new_entry(dec!(8), EntryType::Transfer, now)).unwrap();
        assert_eq!(db.sum_all().unwrap(), dec!(79.75));
    }

    #[test]
    fn unparseable_dates_read_back_as_missing() {
        let db = Db::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO savings_entries (amount, entry_type, date_entered) VALUES ('5', 'deposit', 'yesterday-ish')",
                [],
            )
            .unwrap();
        db.conn
            .execute(
                "INSERT INTO savings_entries (amount, entry_type, date_entered) VALUES ('7', 'deposit', '2026-01-02 03:04:05')",
                [],
            )
            .unwrap();

        let entries = db.list(None, None).unwrap();
        let undated = entries.iter().find(|e| e.amount == dec!(5)).unwrap();
        let legacy = entries.iter().find(|e| e.amount == dec!(7)).unwrap();
        assert!(undated.date_entered.is_none());
        assert!(legacy.date_entered.is_some());
        // Undated rows sort after dated ones.
        assert_eq!(entries.last().unwrap().amount, dec!(5));
    }

    #[test]
    fn duplicate_achievement_is_rejected_by_the_store() {
        let db = Db::open_in_memory().unwrap();
        let a = Achievement {
            kind: AchievementKind::Tier,
            name: "Bronze Saver".to_string(),
            total_savings_at_achievement: dec!(100),
            achieved_at: Utc::now(),
        };
        AchievementLedger::insert(&db, &a).unwrap();
        let err = AchievementLedger::insert(&db, &a).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(db.list_all().unwrap(), vec![a]);
    }

    #[test]
    fn only_one_theme_is_active() {
        let db = Db::open_in_memory().unwrap();
        db.set_unlocked("bronze").unwrap();
        db.set_unlocked("silver").unwrap();
        db.set_unlocked("bronze").unwrap();
        assert_eq!(db.list_unlocked().unwrap().len(), 2);

        db.set_active("bronze").unwrap();
        db.set_active("silver").unwrap();
        assert_eq!(db.get_active().unwrap().as_deref(), Some("silver"));
        let active: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM theme_preferences WHERE is_active = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(active, 1);
    }

    #[test]
    fn failed_unit_of_work_rolls_back_the_entry() {
        let db = Db::open_in_memory().unwrap();
        let rules = Rules::standard().unwrap();
        let engine = Engine::new(&rules, &db, &db, &db);

        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_awards BEFORE INSERT ON achievements BEGIN SELECT RAISE(ABORT, 'store offline'); END;",
            )
            .unwrap();

        let err = engine
            .add_entry(dec!(150), EntryType::Deposit, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(db.list(None, None).unwrap().is_empty());
        assert_eq!(db.sum_all().unwrap(), Decimal::ZERO);
        assert!(db.list_all().unwrap().is_empty());
    }

    #[test]
    fn successful_unit_of_work_commits() {
        let db = Db::open_in_memory().unwrap();
        let rules = Rules::standard().unwrap();
        let engine = Engine::new(&rules, &db, &db, &db);

        let outcome = engine
            .add_entry(dec!(150), EntryType::Deposit, None, None)
            .unwrap();
        assert_eq!(outcome.entry_id, 1);
        assert_eq!(db.list_all().unwrap().len(), 2);
        assert_eq!(db.list_unlocked().unwrap(), vec!["bronze".to_string()]);
    }

    #[test]
    fn paging_follows_date_order_across_formats() {
        let db = Db::open_in_memory().unwrap();
        for (amount, date) in [
            ("1", Some("2026-01-05T10:00:00+00:00")),
            ("2", Some("2026-01-05 09:00:00")),
            ("3", None),
            ("4", Some("2026-01-05T11:30:00.250+00:00")),
            ("5", Some("2026-01-04T23:00:00-05:00")),
        ] {
            db.conn
                .execute(
                    "INSERT INTO savings_entries (amount, entry_type, date_entered) VALUES (?1, 'deposit', ?2)",
                    params![amount, date],
                )
                .unwrap();
        }

        let amounts = |page: Vec<SavingsEntry>| page.iter().map(|e| e.amount).collect::<Vec<_>>();
        // 2026-01-04T23:00-05:00 is 04:00 UTC on the 5th.
        assert_eq!(
            amounts(db.list(None, None).unwrap()),
            vec![dec!(4), dec!(1), dec!(2), dec!(5), dec!(3)]
        );
        assert_eq!(amounts(db.list(Some(2), Some(1)).unwrap()), vec![dec!(1), dec!(2)]);
        assert_eq!(amounts(db.list(None, Some(4)).unwrap()), vec![dec!(3)]);
    }

    #[test]
    fn sum_that_does_not_fit_is_a_storage_error() {
        let db = Db::open_in_memory().unwrap();
        let max = Decimal::MAX.to_string();
        for _ in 0..2 {
            db.conn
                .execute(
                    "INSERT INTO savings_entries (amount, entry_type, date_entered) VALUES (?1, 'deposit', NULL)",
                    params![max],
                )
                .unwrap();
        }
        let err = db.sum_all().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "got {err:?}");
    }
}
