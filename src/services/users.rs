use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::errors::AppError;
use crate::models::{to_fields, Address, AddressDraft, ProfileUpdate, Record, UserProfile, UserRole};
use crate::store::{server_timestamp, DocumentStore, Fields};

/// Account profiles, keyed by the auth provider's uid.
pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let doc = self
            .store
            .get(UserProfile::COLLECTION, uid)
            .await
            .map_err(|e| {
                tracing::error!(uid = %uid, error = %e, "failed to load user profile");
                AppError::read(e)
            })?;
        doc.map(UserProfile::from_document)
            .transpose()
            .map_err(AppError::read)
    }

    /// Merge profile fields, creating the document if needed.
    pub async fn save(&self, uid: &str, update: ProfileUpdate) -> Result<UserProfile, AppError> {
        let mut fields = to_fields(&update).map_err(AppError::write)?;
        fields.insert("updatedAt".into(), server_timestamp());
        self.set(uid, fields, true).await
    }

    /// Return the profile, creating a default customer profile on first
    /// sign-in.
    pub async fn ensure(&self, uid: &str, email: &str, name: &str) -> Result<UserProfile, AppError> {
        if let Some(profile) = self.get(uid).await? {
            return Ok(profile);
        }

        let mut fields = Fields::new();
        fields.insert("uid".into(), json!(uid));
        fields.insert("email".into(), json!(email));
        fields.insert("displayName".into(), json!(name));
        fields.insert("role".into(), json!(UserRole::Customer));
        fields.insert("addresses".into(), json!([]));
        fields.insert("createdAt".into(), server_timestamp());

        let profile = self.set(uid, fields, false).await?;
        tracing::info!(uid = %uid, "created default customer profile");
        Ok(profile)
    }

    /// Append an address. The whole array is rewritten, so two devices
    /// editing at once can lose one edit.
    pub async fn add_address(&self, uid: &str, draft: AddressDraft) -> Result<Address, AppError> {
        if draft.street.trim().is_empty() || draft.city.trim().is_empty() {
            return Err(AppError::Validation("street and city are required".to_string()));
        }

        let mut profile = self.require(uid).await?;
        let address = draft.into_address(Address::generate_id(Utc::now()));
        profile.addresses.push(address.clone());
        self.write_addresses(uid, &profile.addresses).await?;

        tracing::info!(uid = %uid, address_id = %address.id, "address added");
        Ok(address)
    }

    pub async fn remove_address(&self, uid: &str, address_id: &str) -> Result<UserProfile, AppError> {
        let mut profile = self.require(uid).await?;
        let before = profile.addresses.len();
        profile.addresses.retain(|a| a.id != address_id);
        if profile.addresses.len() == before {
            return Err(AppError::NotFound(format!("address {address_id}")));
        }

        let profile = self.write_addresses(uid, &profile.addresses).await?;
        tracing::info!(uid = %uid, address_id = %address_id, "address removed");
        Ok(profile)
    }

    async fn require(&self, uid: &str) -> Result<UserProfile, AppError> {
        self.get(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {uid}")))
    }

    async fn write_addresses(&self, uid: &str, addresses: &[Address]) -> Result<UserProfile, AppError> {
        let mut fields = Fields::new();
        fields.insert("addresses".into(), json!(addresses));
        fields.insert("updatedAt".into(), server_timestamp());

        let doc = self
            .store
            .update(UserProfile::COLLECTION, uid, fields)
            .await
            .map_err(|e| {
                tracing::error!(uid = %uid, error = %e, "failed to save addresses");
                AppError::write(e)
            })?;
        UserProfile::from_document(doc).map_err(AppError::read)
    }

    async fn set(&self, uid: &str, fields: Fields, merge: bool) -> Result<UserProfile, AppError> {
        let doc = self
            .store
            .set(UserProfile::COLLECTION, uid, fields, merge)
            .await
            .map_err(|e| {
                tracing::error!(uid = %uid, error = %e, "failed to save user profile");
                AppError::write(e)
            })?;
        UserProfile::from_document(doc).map_err(AppError::read)
    }
}
