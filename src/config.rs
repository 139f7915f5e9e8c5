use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

/// Runtime configuration, layered as defaults < `REGISTRY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Shared bearer key presented by the upstream authentication layer.
    pub access_key: String,
    /// Base64 encoded 32-byte AES-256-GCM key for personal name fields.
    pub field_key: String,
    /// When set, `GET /admin/account/{id}` requires the admin role.
    pub restrict_account_read: bool,
    pub reauth_per_minute: u32,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:registry.db".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            access_key: String::new(),
            field_key: String::new(),
            restrict_account_read: false,
            reauth_per_minute: 5,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            bootstrap_admin_username: None,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("REGISTRY_"))
            .extract()
    }

    /// Returns the bootstrap admin triple only when all three values are set.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str, &str)> {
        match (
            self.bootstrap_admin_username.as_deref(),
            self.bootstrap_admin_email.as_deref(),
            self.bootstrap_admin_password.as_deref(),
        ) {
            (Some(u), Some(e), Some(p)) => Some((u, e, p)),
            _ => None,
        }
    }
}
