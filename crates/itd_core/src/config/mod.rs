use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, CONFIG_INVALID};

/// How strictly status changes are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// open -> in_progress -> solved only.
    #[default]
    Strict,
    /// Any status may be set from any status.
    Permissive,
}

impl FromStr for TransitionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(AppError::new(CONFIG_INVALID, "Invalid transition mode")
                .with_details(format!("value={s}; expected strict|permissive"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub search_default_limit: u32,
    pub transition_mode: TransitionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            search_default_limit: 10,
            transition_mode: TransitionMode::Strict,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            default_page_size: read_u32(&lookup, "ITD_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: read_u32(&lookup, "ITD_MAX_PAGE_SIZE", defaults.max_page_size)?,
            search_default_limit: read_u32(
                &lookup,
                "ITD_SEARCH_DEFAULT_LIMIT",
                defaults.search_default_limit,
            )?,
            transition_mode: match lookup("ITD_TRANSITION_MODE") {
                Some(raw) => raw.parse()?,
                None => defaults.transition_mode,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_page_size == 0 {
            return Err(AppError::new(CONFIG_INVALID, "max_page_size must be >= 1"));
        }
        if !(1..=self.max_page_size).contains(&self.default_page_size) {
            return Err(AppError::new(
                CONFIG_INVALID,
                "default_page_size must be between 1 and max_page_size",
            )
            .with_details(format!(
                "default_page_size={}; max_page_size={}",
                self.default_page_size, self.max_page_size
            )));
        }
        if !(1..=self.max_page_size).contains(&self.search_default_limit) {
            return Err(AppError::new(
                CONFIG_INVALID,
                "search_default_limit must be between 1 and max_page_size",
            )
            .with_details(format!(
                "search_default_limit={}; max_page_size={}",
                self.search_default_limit, self.max_page_size
            )));
        }
        Ok(())
    }
}

fn read_u32<F>(lookup: &F, key: &str, default: u32) -> Result<u32, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::new(CONFIG_INVALID, format!("{key} must be a positive integer"))
                .with_details(format!("value={raw}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])).unwrap(), EngineConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ITD_DEFAULT_PAGE_SIZE", "25"),
            ("ITD_MAX_PAGE_SIZE", "50"),
            ("ITD_TRANSITION_MODE", "Permissive"),
        ]))
        .unwrap();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.search_default_limit, 10);
        assert_eq!(config.transition_mode, TransitionMode::Permissive);
    }

    #[test]
    fn rejects_bad_values() {
        for vars in [
            vec![("ITD_MAX_PAGE_SIZE", "lots")],
            vec![("ITD_DEFAULT_PAGE_SIZE", "0")],
            vec![("ITD_DEFAULT_PAGE_SIZE", "200")],
            vec![("ITD_TRANSITION_MODE", "loose")],
        ] {
            let err = EngineConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(err.code, CONFIG_INVALID, "{vars:?}");
        }
    }
}
