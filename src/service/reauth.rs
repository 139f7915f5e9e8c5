use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{IdentityStorage, SubjectId};
use crate::error::RegistryError;
use crate::service::access_gate::{AccessGate, Operation};
use crate::service::password::PasswordService;

/// Password confirmation for privileged callers, throttled per subject.
#[derive(Clone)]
pub struct ReauthService {
    storage: IdentityStorage,
    passwords: PasswordService,
    gate: AccessGate,
    limiter: Arc<DefaultKeyedRateLimiter<SubjectId>>,
}

impl ReauthService {
    pub fn new(
        storage: IdentityStorage,
        passwords: PasswordService,
        gate: AccessGate,
        attempts_per_minute: u32,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            storage,
            passwords,
            gate,
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Check `password` against the caller's stored hash.
    ///
    /// Students are refused before any comparison happens, so a matching
    /// password never succeeds for them.
    pub async fn confirm_password(
        &self,
        caller_id: SubjectId,
        password: &str,
    ) -> Result<bool, RegistryError> {
        if self.limiter.check_key(&caller_id).is_err() {
            warn!(subject_id = %caller_id, "password confirmation throttled");
            return Err(RegistryError::RateLimited);
        }

        let credential = self
            .storage
            .credential(caller_id)
            .await?
            .ok_or_else(|| RegistryError::not_found("credential", caller_id))?;
        self.gate
            .authorize(credential.role, Operation::ConfirmPassword)?;

        let matched = self
            .passwords
            .verify(password, &credential.password_hash)
            .await?;
        info!(subject_id = %caller_id, matched, "password confirmation");
        Ok(matched)
    }
}
