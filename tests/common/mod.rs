#![allow(dead_code)]

use subject_registry::FieldCodec;
use subject_registry::config::Config;
use subject_registry::db::models::EducationPayload;
use subject_registry::db::{IdentityStorage, Role, SubjectId};
use subject_registry::router::RegistryState;
use subject_registry::service::reconciliation::RegisterRequest;
use subject_registry::service::{Argon2Config, Caller, PasswordService};

pub const ACCESS_KEY: &str = "test-access-key";
pub const ADMIN_PASSWORD: &str = "root-password";

pub struct Harness {
    pub state: RegistryState,
    pub codec: FieldCodec,
    pub admin: Caller,
}

impl Harness {
    pub fn storage(&self) -> &IdentityStorage {
        &self.state.storage
    }

    /// Register a staff subject through the engine and return its caller identity.
    pub async fn register(&self, username: &str, email: &str, level: &str) -> Caller {
        let id = self
            .state
            .reconciliation
            .register_subject(&self.admin, register_request(username, email, level))
            .await
            .expect("registration failed");
        Caller {
            id,
            role: Role::Staff,
        }
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.storage().pool())
            .await
            .expect("count query failed")
    }

    /// Row counts for credentials, personal, medical, education.
    pub async fn counts(&self) -> [i64; 4] {
        [
            self.count("credentials").await,
            self.count("personal_details").await,
            self.count("medical_records").await,
            self.count("education_records").await,
        ]
    }

    pub async fn password_hash(&self, id: SubjectId) -> String {
        self.storage()
            .credential(id)
            .await
            .expect("lookup failed")
            .expect("credential missing")
            .password_hash
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        access_key: ACCESS_KEY.to_string(),
        reauth_per_minute: 3,
        ..Config::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(cfg: Config) -> Harness {
    let storage = IdentityStorage::connect(&cfg.database_url)
        .await
        .expect("failed to open in-memory store");
    let codec = FieldCodec::new(&[42u8; 32]);
    let passwords =
        PasswordService::new(&Argon2Config::testing()).expect("invalid argon2 test params");
    let state = RegistryState::new(storage, codec.clone(), passwords, &cfg);

    let admin_id = state
        .reconciliation
        .bootstrap_admin("root", "root@example.com", ADMIN_PASSWORD)
        .await
        .expect("bootstrap failed")
        .expect("admin already present");

    Harness {
        state,
        codec,
        admin: Caller {
            id: admin_id,
            role: Role::Admin,
        },
    }
}

/// Make every insert or update on `education_records` abort.
pub async fn refuse_education_writes(h: &Harness) {
    for event in ["INSERT", "UPDATE"] {
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_education_{event} BEFORE {event} ON education_records \
             BEGIN SELECT RAISE(ABORT, 'education write refused'); END"
        ))
        .execute(h.storage().pool())
        .await
        .expect("failed to install trigger");
    }
}

pub fn register_request(username: &str, email: &str, level: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        password: format!("{username}-password"),
        email: email.to_string(),
        education: EducationPayload {
            education_level: Some(level.to_string()),
            ..Default::default()
        },
    }
}
