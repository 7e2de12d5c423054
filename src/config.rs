use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Profile whose ledger every command reads and writes.
    pub current_profile: String,

    /// Prefix used when printing amounts.
    ///
    /// If missing (older configs), it is auto-filled with the default.
    #[serde(default)]
    pub currency_symbol: Option<String>,
}

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₱";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            current_profile: "personal".to_string(),
            currency_symbol: Some(DEFAULT_CURRENCY_SYMBOL.to_string()),
        }
    }
}

impl AppConfig {
    pub fn currency_symbol(&self) -> &str {
        self.currency_symbol
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY_SYMBOL)
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }
}

pub fn app_paths(override_home: Option<PathBuf>) -> Result<AppPaths> {
    if let Some(home) = override_home {
        return Ok(AppPaths {
            config_dir: home.join("config"),
            data_dir: home.join("data"),
        });
    }

    let proj = ProjectDirs::from("com", "budgetbuddy", "buddy")
        .context("Failed to resolve platform directories")?;

    Ok(AppPaths {
        config_dir: proj.config_dir().to_path_buf(),
        data_dir: proj.data_dir().to_path_buf(),
    })
}

pub fn load_or_init_config(paths: &AppPaths) -> Result<(AppConfig, PathBuf)> {
    fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("Failed to create config dir {}", paths.config_dir.display()))?;

    let cfg_path = paths.config_dir.join("config.json");
    if !cfg_path.exists() {
        let cfg = AppConfig::default();
        write_config(&cfg_path, &cfg)?;
        return Ok((cfg, cfg_path));
    }

    let raw = fs::read_to_string(&cfg_path)
        .with_context(|| format!("Failed to read {}", cfg_path.display()))?;
    let mut cfg: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cfg_path.display()))?;

    if cfg.currency_symbol.is_none() {
        cfg.currency_symbol = Some(DEFAULT_CURRENCY_SYMBOL.to_string());
        write_config(&cfg_path, &cfg)?;
    }

    Ok((cfg, cfg_path))
}

pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn profile_slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let mapped = match ch {
            'a'..='z' | '0'..='9' | '-' | '_' => Some(ch),
            'A'..='Z' => Some(ch.to_ascii_lowercase()),
            ' ' | ':' | '/' | '\\' => Some('-'),
            _ => None,
        };
        if let Some(c) = mapped {
            if !(c == '-' && out.ends_with('-')) {
                out.push(c);
            }
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "profile".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_keeps_paths_safe() {
        assert_eq!(profile_slug("Family Savings"), "family-savings");
        assert_eq!(profile_slug("../etc/passwd"), "etc-passwd");
        assert_eq!(profile_slug("  //  "), "profile");
    }

    #[test]
    fn old_config_without_symbol_is_filled_in() {
        let home = tempfile::tempdir().expect("tempdir");
        let paths = app_paths(Some(home.path().to_path_buf())).unwrap();
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(
            paths.config_dir.join("config.json"),
            r#"{"current_profile":"kids"}"#,
        )
        .unwrap();

        let (cfg, cfg_path) = load_or_init_config(&paths).unwrap();
        assert_eq!(cfg.current_profile, "kids");
        assert_eq!(cfg.currency_symbol(), DEFAULT_CURRENCY_SYMBOL);
        let raw = fs::read_to_string(cfg_path).unwrap();
        assert!(raw.contains("currency_symbol"), "{raw}");
    }
}
