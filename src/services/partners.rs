use std::sync::Arc;

use serde_json::json;

use crate::errors::AppError;
use crate::feed::Feed;
use crate::models::{
    decode_all, to_fields, Partner, PartnerDraft, PartnerPatch, PartnerStatus, Record,
};
use crate::store::{server_timestamp, DocumentStore, Fields, Query};

pub struct PartnerService {
    store: Arc<dyn DocumentStore>,
}

impl PartnerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: PartnerDraft) -> Result<Partner, AppError> {
        if draft.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }

        let mut fields = to_fields(&draft).map_err(AppError::write)?;
        fields.insert("rating".into(), json!(0));
        fields.insert("reviewCount".into(), json!(0));
        fields.insert("completedJobs".into(), json!(0));
        fields.insert("status".into(), json!(PartnerStatus::Active));
        fields.insert("createdAt".into(), server_timestamp());

        let doc = self
            .store
            .add(Partner::COLLECTION, fields)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to create partner");
                AppError::write(e)
            })?;

        let partner = Partner::from_document(doc).map_err(AppError::read)?;
        tracing::info!(partner_id = %partner.id, name = %partner.name, "partner created");
        Ok(partner)
    }

    pub async fn list(&self) -> Result<Vec<Partner>, AppError> {
        self.query(Query::collection(Partner::COLLECTION)).await
    }

    /// Partners able to perform the given catalog service.
    pub async fn list_by_service(&self, service_id: &str) -> Result<Vec<Partner>, AppError> {
        self.query(Query::collection(Partner::COLLECTION).where_array_contains("services", service_id))
            .await
    }

    pub async fn update(&self, id: &str, patch: PartnerPatch) -> Result<Partner, AppError> {
        if patch.is_empty() {
            return Err(AppError::Validation("no fields to update".to_string()));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        let fields = to_fields(&patch).map_err(AppError::write)?;
        self.write(id, fields).await
    }

    pub async fn set_status(&self, id: &str, status: PartnerStatus) -> Result<Partner, AppError> {
        let mut fields = Fields::new();
        fields.insert("status".into(), json!(status));
        let partner = self.write(id, fields).await?;
        tracing::info!(partner_id = %id, status = ?status, "partner status changed");
        Ok(partner)
    }

    pub fn subscribe<U, E>(&self, on_update: U, on_error: E) -> Feed<Partner>
    where
        U: FnMut(Vec<Partner>) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        Feed::subscribe(
            Arc::clone(&self.store),
            Query::collection(Partner::COLLECTION),
            on_update,
            on_error,
        )
    }

    async fn query(&self, query: Query) -> Result<Vec<Partner>, AppError> {
        let docs = self.store.query(&query).await.map_err(|e| {
            tracing::error!(error = %e, "failed to list partners");
            AppError::read(e)
        })?;
        decode_all(docs).map_err(AppError::read)
    }

    async fn write(&self, id: &str, fields: Fields) -> Result<Partner, AppError> {
        let doc = self
            .store
            .update(Partner::COLLECTION, id, fields)
            .await
            .map_err(|e| {
                tracing::error!(partner_id = %id, error = %e, "failed to update partner");
                AppError::write(e)
            })?;
        Partner::from_document(doc).map_err(AppError::read)
    }
}
