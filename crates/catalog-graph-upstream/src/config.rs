//! Upstream configuration loaded from the environment or built explicitly.

use url::Url;

/// Service segment of the secure parameter path.
pub const SERVICE_NAME: &str = "graph-db";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Catalog root, e.g. `https://cmr.earthdata.nasa.gov`.
    pub catalog_root: Url,
    /// Deployment environment, first segment of the token path.
    pub environment: String,
    pub service: String,
    /// Parameter name of the catalog token.
    pub token_key: String,
    /// Local/offline operation: no token is fetched.
    pub local_mode: bool,
    pub page_size: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl UpstreamConfig {
    pub fn new(catalog_root: &str, environment: &str, token_key: &str) -> Result<Self, ConfigError> {
        let catalog_root = Url::parse(catalog_root)
            .map_err(|e| ConfigError::Invalid(format!("catalog root '{catalog_root}': {e}")))?;
        if catalog_root.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "catalog root '{catalog_root}' cannot carry a path"
            )));
        }
        Ok(Self {
            catalog_root,
            environment: environment.to_string(),
            service: SERVICE_NAME.to_string(),
            token_key: token_key.to_string(),
            local_mode: false,
            page_size: 2000,
            timeout_secs: 30,
        })
    }

    /// Load `CMR_ROOT`, `ENVIRONMENT`, `CMR_TOKEN_KEY`, `IS_LOCAL`,
    /// `PAGE_SIZE` and `CMR_TIMEOUT_SECS` through `lookup`, usually the
    /// process environment. Blank values count as unset. `IS_LOCAL` is on only for `true`, and
    /// `CMR_TOKEN_KEY` is required unless it is.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = var("CMR_ROOT").ok_or(ConfigError::Missing("CMR_ROOT"))?;
        let local_mode = var("IS_LOCAL").is_some_and(|v| v == "true");
        let environment = var("ENVIRONMENT").unwrap_or_else(|| "local".to_string());
        let token_key = match var("CMR_TOKEN_KEY") {
            Some(key) => key,
            None if local_mode => String::new(),
            None => return Err(ConfigError::Missing("CMR_TOKEN_KEY")),
        };

        let mut config = Self::new(&root, &environment, &token_key)?;
        config.local_mode = local_mode;
        if let Some(page_size) = parse_var(&var, "PAGE_SIZE")? {
            config = config.with_page_size(page_size)?;
        }
        if let Some(secs) = parse_var(&var, "CMR_TIMEOUT_SECS")? {
            config.timeout_secs = secs;
        }
        Ok(config)
    }

    pub fn local(catalog_root: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(catalog_root, "local", "")?;
        config.local_mode = true;
        Ok(config)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, ConfigError> {
        if page_size == 0 {
            return Err(ConfigError::Invalid("page size must be positive".to_string()));
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// `/<environment>/<service>/<token key>`
    pub fn token_path(&self) -> String {
        format!("/{}/{}/{}", self.environment, self.service, self.token_key)
    }

    /// Absolute URL under the catalog root. Each segment is percent-encoded,
    /// so a `/` or `?` inside a concept id stays inside its segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.catalog_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Parse `key` when it is set, naming the variable on failure.
pub fn parse_var<T, F>(lookup: F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key} '{raw}'"))),
        None => Ok(None),
    }
}
