//! `ccom config`: Configuration management commands.

use ccom_config::AppConfig;
use std::path::{Path, PathBuf};

fn config_path(root: &Path) -> PathBuf {
    AppConfig::config_dir(root).join("config.toml")
}

pub async fn validate(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load(root) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config_path(root).exists() {
                warnings.push("No config file; using defaults (run `ccom config init`)");
            }
            if config.consolidation.threshold < 0.5 {
                warnings.push("Consolidation threshold below 0.5 merges loosely related entries");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Database:     {}", config.database_path(root).display());
            println!("   Threshold:    {}", config.consolidation.threshold);
            println!("   Grouping:     {:?}", config.consolidation.grouping);
            println!("   Auto at:      {} entries", config.checkpoint.auto_threshold);
            println!(
                "   Channel:      {}",
                config
                    .capture
                    .default_channel
                    .as_deref()
                    .unwrap_or("(from git branch)")
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(root).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path(root).display());
    Ok(())
}

pub async fn init(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(root);
    if path.exists() {
        println!("ℹ️  Config already exists at {}", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(AppConfig::config_dir(root))?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}
