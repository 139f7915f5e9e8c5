use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{FieldCodec, SealedField};
use crate::db::models::{AccountView, CredentialPatch, EducationPayload};
use crate::db::{DbCredential, EducationRecord, IdentityStorage, PersonalDetail, Role, SubjectId};
use crate::error::{ConflictField, RegistryError};
use crate::service::access_gate::{AccessGate, Caller, Operation};
use crate::service::password::PasswordService;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub education: EducationPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub education: Option<EducationPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalNamesRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A subject's credential and education record, as returned by read/update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRecord {
    pub user: AccountView,
    pub education: Option<EducationRecord>,
}

/// Creates and updates a subject's records across the four tables.
///
/// Every multi-table write runs in one transaction, so a failure part way
/// through leaves no partial subject behind.
#[derive(Clone)]
pub struct ReconciliationEngine {
    storage: IdentityStorage,
    passwords: PasswordService,
    codec: FieldCodec,
    gate: AccessGate,
}

impl ReconciliationEngine {
    pub fn new(
        storage: IdentityStorage,
        passwords: PasswordService,
        codec: FieldCodec,
        gate: AccessGate,
    ) -> Self {
        Self {
            storage,
            passwords,
            codec,
            gate,
        }
    }

    /// Register a new staff subject. Username is checked before email.
    pub async fn register_subject(
        &self,
        caller: &Caller,
        req: RegisterRequest,
    ) -> Result<SubjectId, RegistryError> {
        self.gate.authorize(caller.role, Operation::Register)?;
        self.create_subject(
            &req.username,
            &req.email,
            &req.password,
            Some(&req.education),
            Role::Staff,
        )
        .await
    }

    /// Seed the first admin when none exists yet. Returns the new id, if any.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<SubjectId>, RegistryError> {
        if self.storage.has_admin().await? {
            return Ok(None);
        }
        self.create_subject(username, email, password, None, Role::Admin)
            .await
            .map(Some)
    }

    async fn create_subject(
        &self,
        username: &str,
        email: &str,
        password: &str,
        education: Option<&EducationPayload>,
        role: Role,
    ) -> Result<SubjectId, RegistryError> {
        let username = required("username", username)?;
        let email = valid_email(email)?;
        if password.is_empty() {
            return Err(RegistryError::validation("password is required"));
        }
        let subject_id = SubjectId::generate();
        let education = education.map(|e| e.to_record(subject_id)).transpose()?;

        if self.storage.username_taken(&username, None).await? {
            return Err(RegistryError::Conflict(ConflictField::Username));
        }
        if self.storage.email_taken(&email, None).await? {
            return Err(RegistryError::Conflict(ConflictField::Email));
        }

        let password_hash = self.passwords.hash(password).await?;
        let now = Utc::now();
        let credential = DbCredential {
            id: subject_id,
            username,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        tx.insert_credential(&credential).await?;
        tx.upsert_personal(&PersonalDetail::unset(subject_id)).await?;
        tx.insert_medical(subject_id, now).await?;
        if let Some(education) = &education {
            tx.upsert_education(education).await?;
        }
        tx.commit().await?;

        info!(
            %subject_id,
            role = %role,
            education_level = education.as_ref().map(|e| e.education_level.as_str()),
            "subject registered"
        );
        Ok(subject_id)
    }

    /// Patch a credential and upsert its education record.
    ///
    /// Education input is validated before the uniqueness lookups and hashing.
    /// Email conflicts are reported before username conflicts. A missing
    /// credential fails with `NotFound` before education is touched.
    pub async fn update_subject(
        &self,
        caller: &Caller,
        raw_id: &str,
        req: UpdateRequest,
    ) -> Result<SubjectRecord, RegistryError> {
        let subject_id = SubjectId::parse(raw_id)?;
        self.gate.authorize(caller.role, Operation::UpdateAccount)?;

        let email = req.email.as_deref().map(valid_email).transpose()?;
        let username = req
            .username
            .as_deref()
            .map(|u| required("username", u))
            .transpose()?;

        if let Some(payload) = &req.education {
            let level = payload.level()?;
            if level.is_none() && self.storage.education(subject_id).await?.is_none() {
                return Err(RegistryError::validation("educationLevel is required"));
            }
        }

        if let Some(email) = &email
            && self.storage.email_taken(email, Some(subject_id)).await?
        {
            return Err(RegistryError::Conflict(ConflictField::Email));
        }
        if let Some(username) = &username
            && self.storage.username_taken(username, Some(subject_id)).await?
        {
            return Err(RegistryError::Conflict(ConflictField::Username));
        }

        let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(self.passwords.hash(password).await?),
            None => None,
        };
        let patch = CredentialPatch {
            username,
            email,
            password_hash,
        };

        let mut tx = self.storage.begin().await?;
        let Some(mut credential) = tx.credential(subject_id).await? else {
            return Err(RegistryError::not_found("credential", subject_id));
        };
        patch.apply(&mut credential);
        credential.updated_at = Utc::now();
        tx.update_credential(&credential).await?;

        let education = match &req.education {
            Some(payload) => {
                let existing = tx.education(subject_id).await?;
                let created = existing.is_none();
                let record = payload.merge(subject_id, existing)?;
                tx.upsert_education(&record).await?;
                if created {
                    info!(%subject_id, "education record created on update");
                }
                Some(record)
            }
            None => None,
        };
        tx.commit().await?;

        info!(
            %subject_id,
            password_changed = patch.password_hash.is_some(),
            education_updated = education.is_some(),
            "subject updated"
        );
        Ok(SubjectRecord {
            user: credential.into(),
            education,
        })
    }

    pub async fn read_subject(
        &self,
        caller: &Caller,
        raw_id: &str,
    ) -> Result<SubjectRecord, RegistryError> {
        let subject_id = SubjectId::parse(raw_id)?;
        self.gate.authorize(caller.role, Operation::ReadAccount)?;

        let credential = self
            .storage
            .credential(subject_id)
            .await?
            .ok_or_else(|| RegistryError::not_found("credential", subject_id))?;
        let education = self.storage.education(subject_id).await?;
        Ok(SubjectRecord {
            user: credential.into(),
            education,
        })
    }

    /// Replace a subject's names; absent or blank names are stored unset.
    pub async fn set_personal_names(
        &self,
        caller: &Caller,
        raw_id: &str,
        req: PersonalNamesRequest,
    ) -> Result<(), RegistryError> {
        let subject_id = SubjectId::parse(raw_id)?;
        self.gate.authorize(caller.role, Operation::UpdatePersonal)?;

        let first = req.first_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let last = req.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let detail = PersonalDetail {
            subject_id,
            first_name: SealedField::seal(&self.codec, first)?,
            last_name: SealedField::seal(&self.codec, last)?,
        };

        let mut tx = self.storage.begin().await?;
        if tx.credential(subject_id).await?.is_none() {
            return Err(RegistryError::not_found("credential", subject_id));
        }
        tx.upsert_personal(&detail).await?;
        tx.commit().await?;

        info!(%subject_id, "personal names updated");
        Ok(())
    }
}

fn required(field: &str, value: &str) -> Result<String, RegistryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RegistryError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn valid_email(value: &str) -> Result<String, RegistryError> {
    let email = required("email", value)?;
    if email.chars().any(char::is_whitespace) {
        return Err(RegistryError::validation("email is malformed"));
    }
    Ok(email)
}
