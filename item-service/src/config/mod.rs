use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_DATABASE: &str = "fastapidb";
pub const DEFAULT_CONTAINER: &str = "items";
pub const DEFAULT_THROUGHPUT: u32 = 400;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ItemConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Endpoint URL of the document store. Required for the `mongo` backend.
    pub endpoint: Option<String>,
    /// Account access key, applied as the connection password.
    pub key: Option<Secret<String>>,
    pub database: String,
    pub container: String,
    /// Request units provisioned when the collection is first created.
    /// `None` creates a plain collection.
    pub throughput: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub update_mode: UpdateMode,
    pub max_page_size: u32,
    pub route_prefix: Option<String>,
}

/// How `PUT /items/{id}` treats the existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Overlay the body's top-level fields onto the stored item.
    Merge,
    /// Store the body as the complete new item.
    Replace,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::Merge,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            route_prefix: None,
        }
    }
}

impl StoreConfig {
    /// In-process store with the default database and container names.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            endpoint: None,
            key: None,
            database: DEFAULT_DATABASE.to_string(),
            container: DEFAULT_CONTAINER.to_string(),
            throughput: None,
        }
    }
}

impl ItemConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let endpoint = env::var("COSMOS_ENDPOINT").ok().filter(|v| !v.is_empty());
        let key = env::var("COSMOS_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new);

        if backend == StoreBackend::Mongo && (endpoint.is_none() || key.is_none()) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "COSMOS_ENDPOINT and COSMOS_KEY must be set in environment"
            )));
        }

        let throughput = parse_throughput(&get_env(
            "COSMOS_THROUGHPUT",
            Some(&DEFAULT_THROUGHPUT.to_string()),
            is_prod,
        )?)?;

        let max_page_size = get_env(
            "LIST_MAX_PAGE_SIZE",
            Some(&DEFAULT_MAX_PAGE_SIZE.to_string()),
            is_prod,
        )?
        .parse::<u32>()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid LIST_MAX_PAGE_SIZE: {}", e)))?
        .max(1);

        Ok(ItemConfig {
            common: common_config,
            store: StoreConfig {
                backend,
                endpoint,
                key,
                database: get_env("COSMOS_DATABASE", Some(DEFAULT_DATABASE), is_prod)?,
                container: get_env("COSMOS_CONTAINER", Some(DEFAULT_CONTAINER), is_prod)?,
                throughput,
            },
            api: ApiConfig {
                update_mode: get_env("UPDATE_MODE", Some("merge"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                max_page_size,
                route_prefix: env::var("ROUTE_PREFIX").ok().filter(|v| !v.is_empty()),
            },
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl std::str::FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merge" => Ok(UpdateMode::Merge),
            "replace" => Ok(UpdateMode::Replace),
            _ => Err(format!("Invalid update mode: {}", s)),
        }
    }
}

/// `0` turns throughput provisioning off.
fn parse_throughput(raw: &str) -> Result<Option<u32>, AppError> {
    let value = raw.trim().parse::<u32>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Invalid COSMOS_THROUGHPUT '{}': {}", raw, e))
    })?;
    Ok((value > 0).then_some(value))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
