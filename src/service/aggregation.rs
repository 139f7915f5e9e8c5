use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{FieldCodec, RevealedField};
use crate::db::{IdentityStorage, SubjectId};
use crate::error::RegistryError;
use crate::service::access_gate::RoleVisibility;

/// One row of an aggregated listing, names already decrypted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub first_name: RevealedField,
    pub last_name: RevealedField,
}

/// Joins education records to their credentials and personal details.
#[derive(Clone)]
pub struct AggregationEngine {
    storage: IdentityStorage,
    codec: FieldCodec,
}

impl AggregationEngine {
    pub fn new(storage: IdentityStorage, codec: FieldCodec) -> Self {
        Self { storage, codec }
    }

    /// List subjects at `education_level` whose role passes `visibility`.
    ///
    /// Rows whose credential is missing or hidden, and subjects with no personal
    /// detail, are skipped. Any lookup or decrypt failure fails the whole call.
    /// Output follows education record insertion order.
    pub async fn list_by_education_level(
        &self,
        education_level: &str,
        visibility: &RoleVisibility,
    ) -> Result<Vec<SubjectSummary>, RegistryError> {
        let matches = self.storage.education_with_roles(education_level).await?;
        let total = matches.len();

        let visible: Vec<SubjectId> = matches
            .into_iter()
            .filter_map(|(subject_id, role)| match role {
                Some(role) if visibility.permits(role) => Some(subject_id),
                Some(_) => None,
                None => {
                    debug!(%subject_id, "education record without credential; skipping");
                    None
                }
            })
            .collect();

        let lookups = visible
            .iter()
            .map(|subject_id| self.storage.personal_names(*subject_id));
        let details = try_join_all(lookups).await?;

        let mut summaries = Vec::with_capacity(details.len());
        for (subject_id, detail) in visible.into_iter().zip(details) {
            let Some(detail) = detail else {
                debug!(%subject_id, "no personal detail; skipping");
                continue;
            };
            summaries.push(SubjectSummary {
                subject_id,
                first_name: detail.first_name.reveal(&self.codec)?,
                last_name: detail.last_name.reveal(&self.codec)?,
            });
        }

        info!(
            education_level,
            matched = total,
            returned = summaries.len(),
            "aggregated subject listing"
        );
        Ok(summaries)
    }
}
