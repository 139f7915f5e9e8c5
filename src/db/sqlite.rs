use crate::codec::SealedField;
use crate::db::models::{DbCredential, EducationRecord, PersonalDetail, Role, SubjectId};
use crate::db::schema::SQLITE_INIT;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const CREDENTIAL_COLUMNS: &str =
    "id, username, email, password_hash, role, created_at, updated_at";
const EDUCATION_COLUMNS: &str =
    "subject_id, education_level, year_level, section, department, strand, course";

#[derive(Clone)]
pub struct IdentityStorage {
    pool: SqlitePool,
}

impl IdentityStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database and apply the schema.
    /// In-memory URLs get a single connection so every query sees one database.
    pub async fn connect(database_url: &str) -> Result<Self, RegistryError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let mut pool_opts = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let storage = Self::new(pool_opts.connect_with(connect_opts).await?);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), RegistryError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Start a write transaction. The write lock is taken at `BEGIN IMMEDIATE`,
    /// before the first read, so concurrent writers queue on the busy timeout.
    pub async fn begin(&self) -> Result<SubjectTx, RegistryError> {
        Ok(SubjectTx {
            tx: self.pool.begin_with("BEGIN IMMEDIATE").await?,
        })
    }

    pub async fn credential(&self, id: SubjectId) -> Result<Option<DbCredential>, RegistryError> {
        let row = sqlx::query(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_credential).transpose()
    }

    /// Whether another credential already uses `username`.
    pub async fn username_taken(
        &self,
        username: &str,
        except: Option<SubjectId>,
    ) -> Result<bool, RegistryError> {
        let hit: Option<(String,)> =
            sqlx::query_as("SELECT id FROM credentials WHERE username = ? AND id IS NOT ?")
                .bind(username)
                .bind(except.map(|id| id.to_string()))
                .fetch_optional(&self.pool)
                .await?;
        Ok(hit.is_some())
    }

    /// Whether another credential already uses `email`.
    pub async fn email_taken(
        &self,
        email: &str,
        except: Option<SubjectId>,
    ) -> Result<bool, RegistryError> {
        let hit: Option<(String,)> =
            sqlx::query_as("SELECT id FROM credentials WHERE email = ? AND id IS NOT ?")
                .bind(email)
                .bind(except.map(|id| id.to_string()))
                .fetch_optional(&self.pool)
                .await?;
        Ok(hit.is_some())
    }

    pub async fn has_admin(&self) -> Result<bool, RegistryError> {
        let hit: Option<(String,)> =
            sqlx::query_as("SELECT id FROM credentials WHERE role = 'admin' LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(hit.is_some())
    }

    pub async fn set_role(&self, id: SubjectId, role: Role) -> Result<(), RegistryError> {
        sqlx::query("UPDATE credentials SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn education(&self, id: SubjectId) -> Result<Option<EducationRecord>, RegistryError> {
        let row = sqlx::query(&format!(
            "SELECT {EDUCATION_COLUMNS} FROM education_records WHERE subject_id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_education).transpose()
    }

    /// Education rows at `level` in insertion order, each paired with the role
    /// of its credential, or `None` when the credential cannot be resolved.
    pub async fn education_with_roles(
        &self,
        level: &str,
    ) -> Result<Vec<(SubjectId, Option<Role>)>, RegistryError> {
        let rows = sqlx::query(
            r#"SELECT e.subject_id, c.role
               FROM education_records e
               LEFT JOIN credentials c ON c.id = e.subject_id
               WHERE e.education_level = ?
               ORDER BY e.seq"#,
        )
        .bind(level)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<_, RegistryError> {
                let id = decode_id(row.try_get("subject_id")?)?;
                let role = row
                    .try_get::<Option<String>, _>("role")?
                    .map(|r| decode_role(&r))
                    .transpose()?;
                Ok((id, role))
            })
            .collect()
    }

    /// Projection of a subject's personal detail onto the two name columns.
    pub async fn personal_names(
        &self,
        id: SubjectId,
    ) -> Result<Option<PersonalDetail>, RegistryError> {
        let row = sqlx::query(
            "SELECT subject_id, first_name, last_name FROM personal_details WHERE subject_id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_personal).transpose()
    }
}

/// Write unit spanning the subject tables; dropping it without `commit` rolls back.
pub struct SubjectTx {
    tx: Transaction<'static, Sqlite>,
}

impl SubjectTx {
    pub async fn commit(self) -> Result<(), RegistryError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn insert_credential(&mut self, cred: &DbCredential) -> Result<(), RegistryError> {
        sqlx::query(&format!(
            "INSERT INTO credentials ({CREDENTIAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(cred.id.to_string())
        .bind(&cred.username)
        .bind(&cred.email)
        .bind(&cred.password_hash)
        .bind(cred.role.as_str())
        .bind(cred.created_at.to_rfc3339())
        .bind(cred.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(RegistryError::from_write)?;
        Ok(())
    }

    pub async fn credential(&mut self, id: SubjectId) -> Result<Option<DbCredential>, RegistryError> {
        let row = sqlx::query(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_credential).transpose()
    }

    /// Overwrite every mutable column of an existing credential.
    pub async fn update_credential(&mut self, cred: &DbCredential) -> Result<(), RegistryError> {
        sqlx::query(
            r#"UPDATE credentials SET
                username = ?,
                email = ?,
                password_hash = ?,
                role = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&cred.username)
        .bind(&cred.email)
        .bind(&cred.password_hash)
        .bind(cred.role.as_str())
        .bind(cred.updated_at.to_rfc3339())
        .bind(cred.id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(RegistryError::from_write)?;
        Ok(())
    }

    /// Upsert by subject id.
    pub async fn upsert_personal(&mut self, detail: &PersonalDetail) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO personal_details (subject_id, first_name, last_name)
            VALUES (?, ?, ?)
            ON CONFLICT(subject_id) DO UPDATE SET
                first_name=excluded.first_name,
                last_name=excluded.last_name
            "#,
        )
        .bind(detail.subject_id.to_string())
        .bind(detail.first_name.as_column())
        .bind(detail.last_name.as_column())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn insert_medical(
        &mut self,
        id: SubjectId,
        created_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        sqlx::query("INSERT INTO medical_records (subject_id, created_at) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(created_at.to_rfc3339())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn education(
        &mut self,
        id: SubjectId,
    ) -> Result<Option<EducationRecord>, RegistryError> {
        let row = sqlx::query(&format!(
            "SELECT {EDUCATION_COLUMNS} FROM education_records WHERE subject_id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_education).transpose()
    }

    /// Upsert by unique subject_id; an existing row keeps its sequence number.
    pub async fn upsert_education(&mut self, record: &EducationRecord) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO education_records (
                subject_id, education_level, year_level, section,
                department, strand, course
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject_id) DO UPDATE SET
                education_level=excluded.education_level,
                year_level=excluded.year_level,
                section=excluded.section,
                department=excluded.department,
                strand=excluded.strand,
                course=excluded.course
            "#,
        )
        .bind(record.subject_id.to_string())
        .bind(&record.education_level)
        .bind(&record.year_level)
        .bind(&record.section)
        .bind(&record.department)
        .bind(&record.strand)
        .bind(&record.course)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

fn decode_id(raw: String) -> Result<SubjectId, sqlx::Error> {
    SubjectId::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode_role(raw: &str) -> Result<Role, sqlx::Error> {
    Role::from_str(raw).map_err(|e| sqlx::Error::Decode(e.into()))
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn row_to_credential(row: SqliteRow) -> Result<DbCredential, RegistryError> {
    let id = decode_id(row.try_get("id")?)?;
    let username: String = row.try_get("username")?;
    let email: String = row.try_get("email")?;
    let password_hash: String = row.try_get("password_hash")?;
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(DbCredential {
        id,
        username,
        email,
        password_hash,
        role: decode_role(&role)?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

fn row_to_education(row: SqliteRow) -> Result<EducationRecord, RegistryError> {
    Ok(EducationRecord {
        subject_id: decode_id(row.try_get("subject_id")?)?,
        education_level: row.try_get("education_level")?,
        year_level: row.try_get("year_level")?,
        section: row.try_get("section")?,
        department: row.try_get("department")?,
        strand: row.try_get("strand")?,
        course: row.try_get("course")?,
    })
}

fn row_to_personal(row: SqliteRow) -> Result<PersonalDetail, RegistryError> {
    Ok(PersonalDetail {
        subject_id: decode_id(row.try_get("subject_id")?)?,
        first_name: SealedField::from_column(row.try_get("first_name")?),
        last_name: SealedField::from_column(row.try_get("last_name")?),
    })
}
