// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FeatureDagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FeatureDagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.store))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_scheduler(cfg)?;
    validate_store(cfg)?;
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.max_claim_attempts == 0 {
        return Err(FeatureDagError::ConfigError(
            "[scheduler].max_claim_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    let [first, last] = cfg.scheduler.infra_band;
    if first > last {
        return Err(FeatureDagError::ConfigError(format!(
            "[scheduler].infra_band must be [first, last] with first <= last (got [{first}, {last}])"
        )));
    }

    Ok(())
}

fn validate_store(cfg: &RawConfigFile) -> Result<()> {
    if cfg.store.max_connections == 0 {
        return Err(FeatureDagError::ConfigError(
            "[store].max_connections must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.store.path.as_os_str().is_empty() {
        return Err(FeatureDagError::ConfigError(
            "[store].path must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.scheduler.max_claim_attempts, 5);
        assert_eq!(cfg.scheduler.infra_band, [0, 4]);
        assert_eq!(cfg.store.max_connections, 4);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = parse("[scheduler]\nmax_claim_attempts = 0\n").unwrap_err();
        assert!(matches!(err, FeatureDagError::ConfigError(ref m) if m.contains("max_claim_attempts")));
    }

    #[test]
    fn inverted_band_rejected() {
        let err = parse("[scheduler]\ninfra_band = [4, 0]\n").unwrap_err();
        assert!(matches!(err, FeatureDagError::ConfigError(ref m) if m.contains("infra_band")));
    }

    #[test]
    fn zero_connections_rejected() {
        let err = parse("[store]\nmax_connections = 0\n").unwrap_err();
        assert!(matches!(err, FeatureDagError::ConfigError(_)));
    }

    #[test]
    fn unknown_policy_is_a_toml_error() {
        let err = parse("[scheduler]\ninfra_policy = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, FeatureDagError::TomlError(_)));
    }
}
