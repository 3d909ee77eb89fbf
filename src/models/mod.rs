pub mod booking;
pub mod partner;
pub mod service;
pub mod user;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::store::{Document, Fields, StoreError};

pub use booking::{
    Booking, BookingDraft, BookingSearch, BookingStatus, BookingType, PaymentMethod,
    PaymentStatus, TransitionPolicy,
};
pub use partner::{GeoPoint, Partner, PartnerAvailability, PartnerDraft, PartnerPatch, PartnerStatus};
pub use service::{Service, ServiceCategory, ServiceDraft, ServicePatch};
pub use user::{Address, AddressDraft, ProfileUpdate, UserProfile, UserRole};

/// An entity stored as documents in one collection.
///
/// `from_document` is the single read boundary: missing optional fields are
/// filled from serde defaults here, never at call sites.
pub trait Record: DeserializeOwned + Send + 'static {
    const COLLECTION: &'static str;

    /// Field the document id is exposed under.
    const ID_FIELD: &'static str = "id";

    fn from_document(doc: Document) -> Result<Self, StoreError> {
        let Document { id, mut fields } = doc;
        fields.insert(Self::ID_FIELD.to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| StoreError::Malformed(format!("{}/{id}: {e}", Self::COLLECTION)))
    }

    /// Order applied to every list and feed snapshot. Store order by default.
    fn sort(_records: &mut [Self]) {}
}

pub fn decode_all<T: Record>(docs: Vec<Document>) -> Result<Vec<T>, StoreError> {
    let mut records = docs
        .into_iter()
        .map(T::from_document)
        .collect::<Result<Vec<_>, _>>()?;
    T::sort(&mut records);
    Ok(records)
}

/// Serialize a draft or patch into top-level document fields.
pub(crate) fn to_fields<T: serde::Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Malformed(format!("expected an object, got {other}"))),
    }
}
