//! Config module contains the top-level config for the app.

use std::env;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

/// Basic settings - HTTP binding, database, auth, tenants, archive sweep and image storage
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub auth: Auth,
    pub tenants: Tenants,
    pub archive: Archive,
    pub cloudinary: Option<Cloudinary>,
}

/// Common server settings
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: String,
    /// `postgres://...` selects Postgres, anything else is an SQLite file
    pub database: String,
    pub thread_count: usize,
    pub db_pool_size: u32,
    pub static_dir: String,
    pub config_dir: String,
}

/// Admin sessions and seeded credentials
#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub admin_username: String,
    pub admin_password: String,
    pub admin_legacy_password: Option<String>,
    pub bcrypt_cost: u32,
    pub allow_dev_login: bool,
    pub session_ttl_s: u64,
    pub secure_cookie: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tenants {
    pub default_slug: String,
    pub cache_ttl_s: u64,
}

/// Auto-archive sweep
#[derive(Debug, Deserialize, Clone)]
pub struct Archive {
    pub interval_s: u64,
    pub threshold_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Cloudinary {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub upload_url: Option<String>,
}

/// Creates new app config struct
/// #Examples
/// ```
/// use gastro_lib::config::*;
///
/// let config = Config::new();
/// ```
impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();
        s.merge(File::with_name("config/base"))?;

        // Note that this file is _optional_
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        s.merge(File::with_name(&format!("config/{}", env)).required(false))?;

        // Add in settings from the environment (with a prefix of GASTRO)
        s.merge(Environment::with_prefix("GASTRO").separator("__"))?;

        // Plain variables used by existing deployments
        apply_legacy_env(&mut s)?;

        s.try_into()
    }
}

fn apply_legacy_env(s: &mut RawConfig) -> Result<(), ConfigError> {
    let mapping = [
        ("DATABASE_URL", "server.database"),
        ("PORT", "server.port"),
        ("ADMIN_USERNAME", "auth.admin_username"),
        ("ADMIN_PASSWORD", "auth.admin_password"),
        ("ADMIN_LEGACY_PASSWORD", "auth.admin_legacy_password"),
    ];
    for (var, key) in mapping.iter() {
        if let Some(value) = non_empty_var(var) {
            s.set(key, value)?;
        }
    }

    let cloudinary = (
        non_empty_var("CLOUDINARY_CLOUD_NAME"),
        non_empty_var("CLOUDINARY_API_KEY"),
        non_empty_var("CLOUDINARY_API_SECRET"),
    );
    if let (Some(cloud_name), Some(api_key), Some(api_secret)) = cloudinary {
        s.set("cloudinary.cloud_name", cloud_name)?;
        s.set("cloudinary.api_key", api_key)?;
        s.set("cloudinary.api_secret", api_secret)?;
    }

    Ok(())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
