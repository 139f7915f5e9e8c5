use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::codec::FieldCodec;
use crate::config::Config;
use crate::db::IdentityStorage;
use crate::error::RegistryError;
use crate::handlers::admin;
use crate::service::{
    AccessGate, AggregationEngine, Argon2Config, PasswordService, ReauthService,
    ReconciliationEngine,
};

#[derive(Clone)]
pub struct RegistryState {
    pub storage: IdentityStorage,
    pub gate: AccessGate,
    pub aggregation: AggregationEngine,
    pub reconciliation: ReconciliationEngine,
    pub reauth: ReauthService,
    pub access_key: Arc<str>,
}

impl RegistryState {
    pub fn new(
        storage: IdentityStorage,
        codec: FieldCodec,
        passwords: PasswordService,
        cfg: &Config,
    ) -> Self {
        let gate = AccessGate::new(cfg.restrict_account_read);
        Self {
            aggregation: AggregationEngine::new(storage.clone(), codec.clone()),
            reconciliation: ReconciliationEngine::new(
                storage.clone(),
                passwords.clone(),
                codec,
                gate,
            ),
            reauth: ReauthService::new(storage.clone(), passwords, gate, cfg.reauth_per_minute),
            storage,
            gate,
            access_key: Arc::from(cfg.access_key.as_str()),
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(cfg: &Config) -> Result<Self, RegistryError> {
        let storage = IdentityStorage::connect(&cfg.database_url).await?;
        let codec = FieldCodec::from_base64(&cfg.field_key)?;
        let passwords = PasswordService::new(&Argon2Config {
            memory_cost: cfg.argon2_memory_kib,
            time_cost: cfg.argon2_iterations,
            ..Argon2Config::default()
        })?;
        Ok(Self::new(storage, codec, passwords, cfg))
    }
}

pub fn registry_router(state: RegistryState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/admin", get(admin::list_accounts))
        .route("/admin/register", post(admin::register_subject))
        .route(
            "/admin/account/{id}",
            get(admin::read_account).patch(admin::update_account),
        )
        .route("/admin/account/{id}/personal", put(admin::set_personal_names))
        .route("/admin/password", post(admin::confirm_password))
        .with_state(state)
}
