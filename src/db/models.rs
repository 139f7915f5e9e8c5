use crate::codec::SealedField;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier shared by a credential and all of its child records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id; empty or malformed input is a validation error.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "undefined" {
            return Err(RegistryError::validation("invalid subject id"));
        }
        raw.parse()
            .map_err(|_| RegistryError::validation("invalid subject id"))
    }
}

impl FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbCredential {
    pub id: SubjectId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credential as exposed to callers; the password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: SubjectId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbCredential> for AccountView {
    fn from(c: DbCredential) -> Self {
        Self {
            id: c.id,
            username: c.username,
            email: c.email,
            role: c.role,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Fields of a credential an admin may change. `None` leaves the stored value.
#[derive(Debug, Clone, Default)]
pub struct CredentialPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl CredentialPatch {
    pub fn apply(&self, current: &mut DbCredential) {
        if let Some(username) = &self.username {
            current.username = username.clone();
        }
        if let Some(email) = &self.email {
            current.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            current.password_hash = hash.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalDetail {
    pub subject_id: SubjectId,
    pub first_name: SealedField,
    pub last_name: SealedField,
}

impl PersonalDetail {
    pub fn unset(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            first_name: SealedField::Unset,
            last_name: SealedField::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationRecord {
    pub subject_id: SubjectId,
    pub education_level: String,
    pub year_level: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub strand: Option<String>,
    pub course: Option<String>,
}

/// Education fields as submitted by a caller. Every field is optional so the
/// same shape serves registration (level required) and partial updates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationPayload {
    pub education_level: Option<String>,
    #[serde(alias = "yearlvl")]
    pub year_level: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub strand: Option<String>,
    pub course: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl EducationPayload {
    /// Build a fresh record; the education level is mandatory.
    /// The supplied education level, trimmed. Supplying a blank level is an error.
    pub fn level(&self) -> Result<Option<String>, RegistryError> {
        match &self.education_level {
            None => Ok(None),
            Some(_) => non_blank(&self.education_level)
                .map(Some)
                .ok_or_else(|| RegistryError::validation("educationLevel must not be blank")),
        }
    }

    pub fn to_record(&self, subject_id: SubjectId) -> Result<EducationRecord, RegistryError> {
        let education_level = self
            .level()?
            .ok_or_else(|| RegistryError::validation("educationLevel is required"))?;
        Ok(EducationRecord {
            subject_id,
            education_level,
            year_level: non_blank(&self.year_level),
            section: non_blank(&self.section),
            department: non_blank(&self.department),
            strand: non_blank(&self.strand),
            course: non_blank(&self.course),
        })
    }

    /// Overlay supplied fields on an existing record, or create one when absent.
    pub fn merge(
        &self,
        subject_id: SubjectId,
        existing: Option<EducationRecord>,
    ) -> Result<EducationRecord, RegistryError> {
        let Some(mut record) = existing else {
            return self.to_record(subject_id);
        };
        if let Some(level) = self.level()? {
            record.education_level = level;
        }
        let overlay = [
            (&self.year_level, &mut record.year_level),
            (&self.section, &mut record.section),
            (&self.department, &mut record.department),
            (&self.strand, &mut record.strand),
            (&self.course, &mut record.course),
        ];
        for (supplied, slot) in overlay {
            if supplied.is_some() {
                *slot = non_blank(supplied);
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_rejects_empty_and_garbage() {
        assert!(matches!(
            SubjectId::parse(""),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            SubjectId::parse("undefined"),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            SubjectId::parse("12345"),
            Err(RegistryError::Validation(_))
        ));
        let id = SubjectId::generate();
        assert_eq!(SubjectId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn role_parses_lowercase_names() {
        assert_eq!("staff".parse::<Role>().unwrap(), Role::Staff);
        assert!("Staff".parse::<Role>().is_err());
    }

    #[test]
    fn payload_accepts_legacy_year_alias() {
        let payload: EducationPayload =
            serde_json::from_str(r#"{"educationLevel":"college","yearlvl":"2","course":""}"#)
                .unwrap();
        let record = payload.to_record(SubjectId::generate()).unwrap();
        assert_eq!(record.year_level.as_deref(), Some("2"));
        assert_eq!(record.course, None);
    }

    #[test]
    fn new_record_requires_level() {
        let payload = EducationPayload {
            section: Some("A".into()),
            ..Default::default()
        };
        assert!(matches!(
            payload.merge(SubjectId::generate(), None),
            Err(RegistryError::Validation(_))
        ));
    }

    #[test]
    fn blank_level_rejected_on_create_and_merge() {
        let id = SubjectId::generate();
        let existing = EducationPayload {
            education_level: Some("college".into()),
            ..Default::default()
        }
        .to_record(id)
        .unwrap();
        let blank = EducationPayload {
            education_level: Some("  ".into()),
            course: Some("BSCS".into()),
            ..Default::default()
        };

        assert!(matches!(
            blank.to_record(id),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            blank.merge(id, Some(existing)),
            Err(RegistryError::Validation(_))
        ));
        assert_eq!(EducationPayload::default().level().unwrap(), None);
    }

    #[test]
    fn merge_only_touches_supplied_fields() {
        let id = SubjectId::generate();
        let existing = EducationPayload {
            education_level: Some("seniorHigh".into()),
            strand: Some("STEM".into()),
            section: Some("B".into()),
            ..Default::default()
        }
        .to_record(id)
        .unwrap();

        let patch = EducationPayload {
            section: Some("C".into()),
            strand: Some(String::new()),
            ..Default::default()
        };
        let merged = patch.merge(id, Some(existing)).unwrap();
        assert_eq!(merged.education_level, "seniorHigh");
        assert_eq!(merged.section.as_deref(), Some("C"));
        assert_eq!(merged.strand, None);
    }
}
