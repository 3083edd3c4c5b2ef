//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{OffcacheError, OffcacheResult};
use crate::normalize::UrlNormalizer;
use crate::ui::{self, UiContext};
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.audit_log",
    "app.name",
    "app.version",
    "app.scope",
    "partitions.runtime",
    "partitions.model_weights",
    "partitions.preserved",
    "mirror.enabled",
    "mirror.upstream",
    "mirror.mirror",
    "network.timeout_secs",
    "network.user_agent",
    "storage.root",
    "storage.quota_mb",
    "models.vision.id",
    "models.tts.id",
    "models.asr.id",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> OffcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> OffcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();
    apply(&mut config, key, value)?;

    // Reject a mirror pair the router could not use
    UrlNormalizer::from_config(&config.mirror)?;

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

/// Set one dot-separated key on `config`
fn apply(config: &mut Config, key: &str, value: &str) -> OffcacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => {
            config.general.log_format = match value {
                "text" | "json" => value.to_string(),
                _ => {
                    return Err(OffcacheError::User(format!(
                        "Invalid log format: {}. Use text or json",
                        value
                    )))
                }
            }
        }
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,

        ["app", "name"] => config.app.name = value.to_string(),
        ["app", "version"] => {
            semver::Version::parse(value).map_err(|e| OffcacheError::InvalidVersion {
                value: value.to_string(),
                source: e,
            })?;
            config.app.version = value.to_string();
        }
        ["app", "scope"] => {
            url::Url::parse(value).map_err(|e| OffcacheError::invalid_url(value, e))?;
            config.app.scope = value.to_string();
        }

        ["partitions", "runtime"] => config.partitions.runtime = value.to_string(),
        ["partitions", "model_weights"] => config.partitions.model_weights = value.to_string(),
        ["partitions", "preserved"] => config.partitions.preserved = parse_list(value),

        ["mirror", "enabled"] => config.mirror.enabled = parse_bool(value)?,
        ["mirror", "upstream"] => config.mirror.upstream = value.to_string(),
        ["mirror", "mirror"] => config.mirror.mirror = value.to_string(),

        ["network", "timeout_secs"] => config.network.timeout_secs = parse_u64(value)?,
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        ["storage", "root"] => {
            config.storage.root = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }
        ["storage", "quota_mb"] => config.storage.quota_mb = parse_u64(value)?,

        ["models", "vision", "id"] => config.models.vision.id = value.to_string(),
        ["models", "tts", "id"] => config.models.tts.id = value.to_string(),
        ["models", "asr", "id"] => config.models.asr.id = value.to_string(),

        _ => {
            return Err(OffcacheError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> OffcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(OffcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> OffcacheResult<u64> {
    value
        .parse()
        .map_err(|_| OffcacheError::User(format!("Invalid number: {}", value)))
}
