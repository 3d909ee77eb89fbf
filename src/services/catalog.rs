use std::sync::Arc;

use serde_json::json;

use crate::errors::AppError;
use crate::feed::Feed;
use crate::models::{decode_all, to_fields, Record, Service, ServiceDraft, ServicePatch};
use crate::services::stats::ServiceStats;
use crate::store::{server_timestamp, DocumentStore, Fields, Query};

pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: ServiceDraft) -> Result<Service, AppError> {
        draft.validate().map_err(AppError::Validation)?;

        let mut fields = to_fields(&draft).map_err(AppError::write)?;
        fields.insert("active".into(), json!(true));
        fields.insert("createdAt".into(), server_timestamp());

        let doc = self
            .store
            .add(Service::COLLECTION, fields)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to create service");
                AppError::write(e)
            })?;

        let service = Service::from_document(doc).map_err(AppError::read)?;
        tracing::info!(service_id = %service.id, name = %service.name, "service created");
        Ok(service)
    }

    pub async fn list(&self, only_active: bool) -> Result<Vec<Service>, AppError> {
        let docs = self
            .store
            .query(&services_query(only_active))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to list services");
                AppError::read(e)
            })?;
        decode_all(docs).map_err(AppError::read)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Service>, AppError> {
        let doc = self
            .store
            .get(Service::COLLECTION, id)
            .await
            .map_err(|e| {
                tracing::error!(service_id = %id, error = %e, "failed to load service");
                AppError::read(e)
            })?;
        doc.map(Service::from_document)
            .transpose()
            .map_err(AppError::read)
    }

    pub async fn update(&self, id: &str, patch: ServicePatch) -> Result<Service, AppError> {
        patch.validate().map_err(AppError::Validation)?;
        let fields = to_fields(&patch).map_err(AppError::write)?;
        self.write(id, fields).await
    }

    /// Soft enable/disable. Bookings already made keep their snapshot.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<Service, AppError> {
        let mut fields = Fields::new();
        fields.insert("active".into(), json!(active));
        let service = self.write(id, fields).await?;
        tracing::info!(service_id = %id, active, "service availability changed");
        Ok(service)
    }

    pub fn subscribe<U, E>(&self, only_active: bool, on_update: U, on_error: E) -> Feed<Service>
    where
        U: FnMut(Vec<Service>) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        Feed::subscribe(
            Arc::clone(&self.store),
            services_query(only_active),
            on_update,
            on_error,
        )
    }

    pub fn subscribe_stats<U, E>(&self, mut on_update: U, on_error: E) -> Feed<Service>
    where
        U: FnMut(ServiceStats) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        self.subscribe(
            false,
            move |services| on_update(ServiceStats::from_services(&services)),
            on_error,
        )
    }

    async fn write(&self, id: &str, fields: Fields) -> Result<Service, AppError> {
        let doc = self
            .store
            .update(Service::COLLECTION, id, fields)
            .await
            .map_err(|e| {
                tracing::error!(service_id = %id, error = %e, "failed to update service");
                AppError::write(e)
            })?;
        Service::from_document(doc).map_err(AppError::read)
    }
}

fn services_query(only_active: bool) -> Query {
    let query = Query::collection(Service::COLLECTION);
    if only_active {
        query.where_eq("active", true)
    } else {
        query
    }
}
