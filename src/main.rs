mod cli;
mod config;
mod db;
mod domain;
mod engine;
mod error;
mod stats;
mod store;
mod tiers;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fs;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{Cli, Command, EntryArgs, LedgerCmd, ProfileCmd, ThemeCmd};
use crate::config::{AppConfig, AppPaths, app_paths, load_or_init_config, write_config};
use crate::db::Db;
use crate::domain::{Achievement, EntryType};
use crate::engine::{Engine, EntryOutcome, TierStatus};
use crate::error::Error;
use crate::tiers::{Rules, perks_for_level};

fn main() {
    let cli = Cli::parse();
    init_logger(cli.log_level);

    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;
    debug!(profile = %cfg.current_profile, config = %cfg_path.display(), "loaded config");

    match cli.command {
        Command::Profile(args) => {
            handle_profile(args.cmd, &paths, &mut cfg, &cfg_path)?;
            Ok(())
        }
        Command::Ledger(cmd) => {
            let (db, db_path) = Db::open(&paths, &cfg.current_profile)?;
            debug!(db = %db_path.display(), "opened ledger");
            let rules = Rules::standard()?;
            let engine = Engine::new(&rules, &db, &db, &db);
            let symbol = cfg.currency_symbol();

            match cmd {
                LedgerCmd::Add(args) => {
                    let entry_type = args.entry_type.parse::<EntryType>()?;
                    record_entry(&engine, entry_type, args.entry, symbol)?;
                }
                LedgerCmd::Deposit(args) => {
                    record_entry(&engine, EntryType::Deposit, args, symbol)?;
                }
                LedgerCmd::Withdraw(args) => {
                    record_entry(&engine, EntryType::Withdrawal, args, symbol)?;
                }
                LedgerCmd::Entries(args) => {
                    let entries = engine.entries(args.limit, args.offset)?;
                    if entries.is_empty() {
                        println!("(no entries)");
                    } else {
                        println!("id\tdate\ttype\tamount\tlabel\tpurpose\tsynced");
                        for e in entries {
                            println!(
                                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                                e.id,
                                e.date_entered
                                    .map(|d| d.to_rfc3339())
                                    .unwrap_or_else(|| "?".to_string()),
                                e.entry_type,
                                money(symbol, e.signed_amount()),
                                e.label.as_deref().unwrap_or(""),
                                e.purpose.as_deref().unwrap_or(""),
                                if e.synced { "yes" } else { "no" },
                            );
                        }
                    }
                }
                LedgerCmd::Tier => {
                    let balance = engine.balance()?;
                    let status = engine.current_tier()?;
                    print_tier(&status, balance, symbol);
                }
                LedgerCmd::Stats => {
                    let stats = engine.stats()?;
                    println!("total_savings\t{}", money(symbol, stats.total_savings));
                    println!("total_entries\t{}", stats.total_entries);
                    println!("average_entry\t{}", money(symbol, stats.average_entry));
                    println!("weekly_average\t{}", money(symbol, stats.weekly_average));
                    println!("monthly_average\t{}", money(symbol, stats.monthly_average));
                }
                LedgerCmd::Achievements => {
                    let all = engine.achievements()?;
                    if all.is_empty() {
                        println!("(no achievements)");
                    } else {
                        println!("type\tname\tbalance\tachieved_at");
                        for a in all {
                            println!(
                                "{}\t{}\t{}\t{}",
                                a.kind,
                                a.name,
                                money(symbol, a.total_savings_at_achievement),
                                a.achieved_at.to_rfc3339()
                            );
                        }
                    }
                }
                LedgerCmd::Check => {
                    let evaluation = engine.check_and_award_achievements()?;
                    if evaluation.newly_awarded.is_empty() {
                        println!("Nothing new at {}.", money(symbol, evaluation.balance));
                    }
                    print_awards(&evaluation.newly_awarded, &evaluation.theme_unlocks);
                }
                LedgerCmd::Theme(args) => handle_theme(&engine, args.cmd)?,
            }
            Ok(())
        }
    }
}

fn record_entry(
    engine: &Engine<'_, Db, Db, Db>,
    entry_type: EntryType,
    args: EntryArgs,
    symbol: &str,
) -> Result<()> {
    let amount = parse_amount(&args.amount)?;
    let date = parse_rfc3339_opt(args.date.as_deref())?;

    let outcome: EntryOutcome = match date {
        Some(date) => engine.add_entry_at(amount, entry_type, args.label, args.purpose, date)?,
        None => engine.add_entry(amount, entry_type, args.label, args.purpose)?,
    };

    println!(
        "Recorded entry {} ({} {}).",
        outcome.entry_id,
        entry_type,
        money(symbol, amount)
    );
    print_awards(&outcome.new_achievements, &outcome.unlocked_themes);
    Ok(())
}

fn print_awards(achievements: &[Achievement], themes: &[String]) {
    for a in achievements {
        println!("Achievement unlocked: {} '{}'", a.kind, a.name);
    }
    for theme in themes {
        println!("Theme unlocked: {theme}");
    }
}

fn print_tier(status: &TierStatus, balance: Decimal, symbol: &str) {
    let percent_i = status
        .progress
        .round_dp(0)
        .to_i32()
        .unwrap_or(0)
        .clamp(0, 100);
    let bar_len = 10usize;
    let filled = ((percent_i as usize) * bar_len) / 100;
    let empty = bar_len.saturating_sub(filled);
    let bar = format!("[{}{}]", "=".repeat(filled), "-".repeat(empty));

    println!("tier\t{}", status.tier.name);
    println!("level\t{}", status.level);
    println!("balance\t{}", money(symbol, balance));
    println!("progress\t{} {}%", bar, status.progress.round_dp(2).normalize());
    match (&status.next, status.amount_to_next) {
        (Some(next), Some(to_go)) => {
            println!("next\t{}\t{} to go", next.name, money(symbol, to_go));
        }
        _ => println!("next\t(top tier reached)"),
    }

    let perks = perks_for_level(status.level);
    let limit = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "unlimited".into());
    let flags = [
        ("basic_ai_chat", perks.basic_ai_chat),
        ("premium_themes", perks.premium_themes),
        ("advanced_insights", perks.advanced_insights),
        ("export_data", perks.export_data),
        ("unlimited_ai", perks.unlimited_ai),
        ("priority_support", perks.priority_support),
    ];
    for (name, enabled) in flags {
        if enabled {
            println!("perk\t{name}");
        }
    }
    println!("ai_requests_per_day\t{}", limit(perks.ai_requests_per_day));
    println!("insights_per_month\t{}", limit(perks.insights_per_month));
}

fn handle_theme(engine: &Engine<'_, Db, Db, Db>, cmd: ThemeCmd) -> Result<()> {
    match cmd {
        ThemeCmd::List => {
            let active = engine.active_theme()?;
            for theme in engine.unlocked_themes()? {
                let marker = if theme == active { "*" } else { " " };
                println!("{marker} {theme}");
            }
        }
        ThemeCmd::Activate { theme_id } => {
            engine.activate_theme(&theme_id)?;
            println!("Activated theme: {theme_id}");
        }
    }
    Ok(())
}

fn handle_profile(
    cmd: ProfileCmd,
    paths: &AppPaths,
    cfg: &mut AppConfig,
    cfg_path: &std::path::Path,
) -> Result<()> {
    match cmd {
        ProfileCmd::Check => {
            println!("You are currently in profile: {}", cfg.current_profile);
        }
        ProfileCmd::Add { name } => {
            // Creating a profile is just creating its db.
            let _ = Db::open(paths, &name)?;
            println!("Added profile: {name}");
        }
        ProfileCmd::Checkout { name } => {
            let _ = Db::open(paths, &name)?;
            cfg.current_profile = name.clone();
            write_config(cfg_path, cfg)?;
            println!("Checked out profile: {name}");
        }
        ProfileCmd::List => {
            let dir = paths.profiles_dir();
            let mut names = Vec::new();
            if dir.exists() {
                for entry in fs::read_dir(&dir)
                    .with_context(|| format!("Failed to read {}", dir.display()))?
                {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
            names.sort();
            if names.is_empty() {
                println!("(no profiles)");
            }
            let current = crate::config::profile_slug(&cfg.current_profile);
            for name in names {
                let marker = if name == current { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
    }
    Ok(())
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|_| Error::Validation(format!("amount '{raw}' is not a number")))?;
    Ok(amount)
}

fn parse_rfc3339_opt(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(
            DateTime::parse_from_rfc3339(s)
                .with_context(|| format!("Invalid RFC3339 timestamp: {s}"))?
                .with_timezone(&Utc),
        )),
    }
}

fn money(symbol: &str, amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{symbol}{:.2}", rounded.abs())
    } else {
        format!("{symbol}{:.2}", rounded.abs())
    }
}
