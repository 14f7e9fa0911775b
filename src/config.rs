use std::path::{Path, PathBuf};

use crate::errors::{Result, StepError};

/// Schema directory used when none is configured.
pub const DEFAULT_SCHEMAS_PATH: &str = "schemas";

pub const BASE_URL_ENV: &str = "API_STEPS_BASE_URL";
pub const DEBUG_ENV: &str = "API_STEPS_DEBUG";
pub const SCHEMAS_ENV: &str = "API_STEPS_SCHEMAS";

/// Settings that survive scenario resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Prefix for every request path, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Dump full requests and responses through `tracing`.
    pub debug: bool,
    /// Directory that schema paths in steps are relative to.
    pub schemas_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: String::new(),
            debug: false,
            schemas_path: PathBuf::from(DEFAULT_SCHEMAS_PATH),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read `API_STEPS_BASE_URL`, `API_STEPS_DEBUG` and `API_STEPS_SCHEMAS`,
    /// keeping the default for anything unset. A debug flag that is not a
    /// recognised boolean is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ApiConfig::default();
        if let Some(url) = lookup(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(flag) = lookup(DEBUG_ENV) {
            config.debug = parse_flag(&flag).ok_or_else(|| StepError::InvalidConfig {
                var: DEBUG_ENV,
                value: flag.clone(),
            })?;
        }
        if let Some(path) = lookup(SCHEMAS_ENV).filter(|p| !p.is_empty()) {
            config.schemas_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_schemas_path(mut self, path: impl AsRef<Path>) -> Self {
        self.schemas_path = path.as_ref().to_path_buf();
        self
    }
}

/// `1`/`true`/`yes` or `0`/`false`/`no` (any case); empty reads as off.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
