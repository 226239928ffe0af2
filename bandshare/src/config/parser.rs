//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::{ConfigFile, LogHandler};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("endpoint") {
            config.storage.endpoint = v.trim().to_string();
        }
        if let Some(v) = section.get("bucket") {
            config.storage.bucket = v.trim().to_string();
        }
    }

    // [coordination] section
    if let Some(section) = ini.section(Some("coordination")) {
        if let Some(v) = section.get("barrier_timeout_secs") {
            config.coordination.barrier_timeout_secs =
                parse_positive(v, "coordination", "barrier_timeout_secs", "seconds")?;
        }
        if let Some(v) = section.get("leader_timeout_secs") {
            config.coordination.leader_timeout_secs =
                parse_positive(v, "coordination", "leader_timeout_secs", "seconds")?;
        }
        if let Some(v) = section.get("poll_min_ms") {
            config.coordination.poll_min_ms =
                parse_positive(v, "coordination", "poll_min_ms", "milliseconds")?;
        }
        if let Some(v) = section.get("poll_max_ms") {
            config.coordination.poll_max_ms =
                parse_positive(v, "coordination", "poll_max_ms", "milliseconds")?;
        }
        if let Some(v) = section.get("max_concurrent_downloads") {
            let v = v.trim();
            config.coordination.max_concurrent_downloads = if v.is_empty() {
                None
            } else {
                Some(parse_positive(
                    v,
                    "coordination",
                    "max_concurrent_downloads",
                    "downloads",
                )?)
            };
        }
        if config.coordination.barrier_timeout_secs < config.coordination.leader_timeout_secs {
            return Err(ConfigFileError::InvalidValue {
                section: "coordination".to_string(),
                key: "barrier_timeout_secs".to_string(),
                value: config.coordination.barrier_timeout_secs.to_string(),
                reason: format!(
                    "must be at least leader_timeout_secs ({})",
                    config.coordination.leader_timeout_secs
                ),
            });
        }
        if config.coordination.poll_min_ms > config.coordination.poll_max_ms {
            return Err(ConfigFileError::InvalidValue {
                section: "coordination".to_string(),
                key: "poll_min_ms".to_string(),
                value: config.coordination.poll_min_ms.to_string(),
                reason: "must not exceed poll_max_ms".to_string(),
            });
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.download.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("level") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.level = v.to_lowercase();
            }
        }
        if let Some(v) = section.get("handler") {
            config.logging.handler =
                LogHandler::from_str(v).map_err(|_| ConfigFileError::InvalidValue {
                    section: "logging".to_string(),
                    key: "handler".to_string(),
                    value: v.to_string(),
                    reason: "must be 'console' or 'file'".to_string(),
                })?;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Parses a strictly positive integer, reporting the offending key on failure.
fn parse_positive<T>(value: &str, section: &str, key: &str, unit: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: format!("must be a positive integer ({})", unit),
        }),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
