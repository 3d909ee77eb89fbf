use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceCategory {
    Appliance,
    Vehicle,
    Electronics,
    Plumbing,
    Cleaning,
}

/// Catalog entry. Disabled rather than deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: ServiceCategory,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Record for Service {
    const COLLECTION: &'static str = "services";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDraft {
    pub name: String,
    pub category: ServiceCategory,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl ServiceDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        check_price(self.price)
    }
}

fn check_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price < 0.0 {
        return Err("price must be a non-negative number".to_string());
    }
    Ok(())
}

/// Partial edit from the admin form. `active` is changed through its own
/// operation, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ServiceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl ServicePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Same rules as [`ServiceDraft::validate`] for the fields being set.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("no fields to update".to_string());
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name cannot be empty".to_string());
        }
        match self.price {
            Some(price) => check_price(price),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_fields;
    use crate::store::Document;
    use serde_json::json;

    #[test]
    fn test_unknown_category_rejected() {
        let doc = Document {
            id: "s1".to_string(),
            fields: json!({"name": "Roof", "category": "Roofing", "price": 10})
                .as_object()
                .cloned()
                .unwrap(),
        };
        assert!(Service::from_document(doc).is_err());
    }

    #[test]
    fn test_missing_active_defaults_to_true() {
        let doc = Document {
            id: "s1".to_string(),
            fields: json!({"name": "Sink fix", "category": "Plumbing", "price": 300})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let service = Service::from_document(doc).unwrap();
        assert!(service.active);
        assert_eq!(service.duration_minutes, 0);
    }

    #[test]
    fn test_patch_only_writes_set_fields() {
        let patch = ServicePatch {
            price: Some(499.0),
            ..Default::default()
        };
        let fields = to_fields(&patch).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["price"], 499.0);
        assert!(ServicePatch::default().is_empty());
    }

    #[test]
    fn test_patch_validation() {
        let price = |p: f64| ServicePatch {
            price: Some(p),
            ..Default::default()
        };
        assert!(price(0.0).validate().is_ok());
        assert!(price(-500.0).validate().is_err());
        assert!(price(f64::NAN).validate().is_err());
        assert!(ServicePatch::default().validate().is_err());

        let blank = ServicePatch {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }
}
