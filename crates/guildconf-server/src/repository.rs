use guildconf_kernel::{default_tenant_document, document_digest, SectionName, TenantDocument};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::store::{ConfigStore, SectionRow, StoreError, StoreQuery};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("section `{section}` of tenant `{tenant_id}` is not valid JSON: {message}")]
    Corrupt {
        tenant_id: String,
        section: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    AlreadyInitialized,
}

/// Whole-document access to a tenant's configuration. Every call goes to the
/// store; nothing is cached between calls.
///
/// `load` followed by `save` is not atomic: of two interleaved edits of the
/// same tenant, the later save wins for every section it writes.
#[derive(Clone)]
pub struct TenantRepository {
    store: ConfigStore,
}

impl TenantRepository {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// `None` when the tenant has no persisted sections.
    pub async fn load(&self, tenant_id: &str) -> Result<Option<TenantDocument>, RepositoryError> {
        let rows = self
            .store
            .execute(StoreQuery::SelectTenant {
                tenant_id: tenant_id.to_string(),
            })
            .await
            .inspect_err(|err| error!(tenant_id, error = %err, "tenant load failed"))?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut doc = TenantDocument::new();
        for row in rows {
            let value: Value = serde_json::from_str(&row.settings_json).map_err(|err| {
                error!(tenant_id, section = %row.section, "stored section is corrupt");
                RepositoryError::Corrupt {
                    tenant_id: tenant_id.to_string(),
                    section: row.section.clone(),
                    message: err.to_string(),
                }
            })?;
            doc.insert(row.section, value);
        }
        Ok(Some(doc))
    }

    /// One upsert per section, in key order. There is no cross-section
    /// transaction: on failure the sections before the failing one stay
    /// written.
    pub async fn save(&self, tenant_id: &str, doc: &TenantDocument) -> Result<(), RepositoryError> {
        for (section, value) in doc {
            let settings_json = serde_json::to_string(value)
                .map_err(|err| StoreError::Serialization(err.to_string()))?;
            let row = SectionRow {
                tenant_id: tenant_id.to_string(),
                section: section.clone(),
                settings_json,
            };
            if let Err(err) = self.store.execute(StoreQuery::UpsertSection(row)).await {
                error!(tenant_id, section = %section, error = %err, "tenant save failed");
                return Err(err.into());
            }
        }

        let digest = document_digest(doc).unwrap_or_else(|err| format!("unavailable ({err})"));
        info!(tenant_id, sections = doc.len(), digest = %digest, "tenant document saved");
        Ok(())
    }

    /// Writes the default document unless the tenant already has sections.
    pub async fn initialize(&self, tenant_id: &str) -> Result<InitOutcome, RepositoryError> {
        if self.load(tenant_id).await?.is_some() {
            return Ok(InitOutcome::AlreadyInitialized);
        }
        self.save(tenant_id, &default_tenant_document()).await?;
        info!(tenant_id, sections = SectionName::ALL.len(), "tenant initialized");
        Ok(InitOutcome::Initialized)
    }
}
