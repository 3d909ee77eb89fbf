use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GeoPoint, Record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
    Partner,
}

/// Address embedded in a profile and snapshotted into bookings. Ids are
/// generated client-side, see [`Address::generate_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_point: Option<GeoPoint>,
}

impl Address {
    /// `addr_<unix millis>_<random suffix>`.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!("addr_{}_{}", now.timestamp_millis(), &random[..9])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDraft {
    #[serde(default)]
    pub label: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub geo_point: Option<GeoPoint>,
}

impl AddressDraft {
    pub fn into_address(self, id: String) -> Address {
        Address {
            id,
            label: self.label,
            street: self.street,
            city: self.city,
            zip_code: self.zip_code,
            geo_point: self.geo_point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for UserProfile {
    const COLLECTION: &'static str = "user";
    const ID_FIELD: &'static str = "uid";
}

/// Self-service profile edit. Role is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}
