use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, Record};

/// Days of warranty granted when a booking is completed.
pub const WARRANTY_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub partner_id: String,
    pub service_id: String,
    /// Copied from the catalog at creation; never follows later catalog edits.
    pub service_name: String,
    pub service_price: f64,
    #[serde(rename = "type", default)]
    pub booking_type: BookingType,
    pub status: BookingStatus,
    pub scheduled_time: DateTime<Utc>,
    pub location: Address,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty_valid_until: Option<DateTime<Utc>>,
    /// Store commit time of the create. Absent until the store has stamped it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Booking {
    const COLLECTION: &'static str = "bookings";

    /// Newest first; bookings without a creation time go last.
    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    #[default]
    Instant,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Forward-only lifecycle: pending -> accepted -> in_progress -> completed,
    /// and any non-terminal status may be cancelled.
    pub fn can_advance_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Pending, Accepted) | (Accepted, InProgress) | (InProgress, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Cash collected by the partner on completion; the only method offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "COD")]
    Cod,
}

/// Which status changes `UpdateStatus` accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Only forward moves along the lifecycle, plus cancelling a live booking.
    #[default]
    Strict,
    /// Any status may be set from any other.
    Permissive,
}

impl TransitionPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(TransitionPolicy::Strict),
            "permissive" => Some(TransitionPolicy::Permissive),
            _ => None,
        }
    }

    pub fn allows(&self, from: BookingStatus, to: BookingStatus) -> bool {
        match self {
            TransitionPolicy::Strict => from.can_advance_to(to),
            TransitionPolicy::Permissive => true,
        }
    }
}

/// Everything a customer supplies when booking. Status, payment status and
/// creation time are set by the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub customer_id: String,
    pub partner_id: String,
    pub service_id: String,
    pub service_name: String,
    pub service_price: f64,
    #[serde(rename = "type", default)]
    pub booking_type: BookingType,
    pub scheduled_time: DateTime<Utc>,
    pub location: Address,
    #[serde(default)]
    pub total_amount: Option<f64>,
}

impl BookingDraft {
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("customerId", &self.customer_id),
            ("partnerId", &self.partner_id),
            ("serviceId", &self.service_id),
            ("serviceName", &self.service_name),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("{name} is required"));
        }
        if !self.service_price.is_finite() || self.service_price < 0.0 {
            return Err("servicePrice must be a non-negative number".to_string());
        }
        if let Some(total) = self.total_amount {
            if !total.is_finite() || total < 0.0 {
                return Err("totalAmount must be a non-negative number".to_string());
            }
        }
        Ok(())
    }
}

/// Admin table filtering: optional status and payment filters plus a
/// case-insensitive text match on service name, booking id or customer id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingSearch {
    pub status: Option<BookingStatus>,
    pub payment: Option<PaymentStatus>,
    pub text: Option<String>,
}

impl BookingSearch {
    pub fn matches(&self, booking: &Booking) -> bool {
        if self.status.is_some_and(|s| s != booking.status) {
            return false;
        }
        if self.payment.is_some_and(|p| p != booking.payment_status) {
            return false;
        }
        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => {
                let needle = text.to_lowercase();
                [&booking.service_name, &booking.id, &booking.customer_id]
                    .iter()
                    .any(|hay| hay.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    pub fn apply(&self, bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.into_iter().filter(|b| self.matches(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use serde_json::json;

    fn doc(id: &str, extra: serde_json::Value) -> Document {
        let mut fields = json!({
            "customerId": "cust-1",
            "partnerId": "p-1",
            "serviceId": "svc-1",
            "serviceName": "AC Repair",
            "servicePrice": 850,
            "type": "instant",
            "status": "pending",
            "scheduledTime": "2025-06-16T10:00:00Z",
            "location": {"id": "addr_1", "label": "Home", "street": "1 Main St", "city": "Pune", "zipCode": "411001"},
            "paymentMethod": "COD",
            "totalAmount": 850,
            "paymentStatus": "pending"
        })
        .as_object()
        .cloned()
        .unwrap();
        fields.extend(extra.as_object().cloned().unwrap());
        Document {
            id: id.to_string(),
            fields,
        }
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
            assert_eq!(json!(status), json!(status.as_str()));
        }
        assert_eq!(BookingStatus::parse("confirmed"), None);
    }

    #[test]
    fn test_strict_lifecycle() {
        use BookingStatus::*;
        assert!(Pending.can_advance_to(Accepted));
        assert!(Accepted.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(Completed));
        assert!(Pending.can_advance_to(Cancelled));
        assert!(InProgress.can_advance_to(Cancelled));

        assert!(!Pending.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Cancelled));
        assert!(!Cancelled.can_advance_to(Pending));
        assert!(!Accepted.can_advance_to(Pending));
    }

    #[test]
    fn test_permissive_allows_backwards() {
        let policy = TransitionPolicy::Permissive;
        assert!(policy.allows(BookingStatus::Completed, BookingStatus::Pending));
        assert!(!TransitionPolicy::Strict.allows(BookingStatus::Completed, BookingStatus::Pending));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(TransitionPolicy::parse("STRICT"), Some(TransitionPolicy::Strict));
        assert_eq!(TransitionPolicy::parse(" permissive "), Some(TransitionPolicy::Permissive));
        assert_eq!(TransitionPolicy::parse("loose"), None);
    }

    #[test]
    fn test_from_document_fills_defaults() {
        let mut d = doc("b1", json!({}));
        d.fields.remove("paymentStatus");
        d.fields.remove("paymentMethod");
        d.fields.remove("type");
        let booking = Booking::from_document(d).unwrap();
        assert_eq!(booking.id, "b1");
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.payment_method, PaymentMethod::Cod);
        assert_eq!(booking.booking_type, BookingType::Instant);
        assert!(booking.created_at.is_none());
        assert!(booking.warranty_valid_until.is_none());
    }

    #[test]
    fn test_from_document_rejects_unknown_status() {
        let err = Booking::from_document(doc("b1", json!({"status": "confirmed"}))).unwrap_err();
        assert!(err.to_string().contains("bookings/b1"));
    }

    #[test]
    fn test_sort_newest_first_missing_last() {
        let mut bookings = vec![
            Booking::from_document(doc("old", json!({"createdAt": "2025-01-01T00:00:00Z"}))).unwrap(),
            Booking::from_document(doc("unstamped", json!({}))).unwrap(),
            Booking::from_document(doc("new", json!({"createdAt": "2025-03-01T00:00:00Z"}))).unwrap(),
        ];
        Booking::sort(&mut bookings);
        let ids: Vec<_> = bookings.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "unstamped"]);
    }

    #[test]
    fn test_draft_validation() {
        let booking = Booking::from_document(doc("b1", json!({}))).unwrap();
        let mut draft = BookingDraft {
            customer_id: booking.customer_id,
            partner_id: booking.partner_id,
            service_id: booking.service_id,
            service_name: booking.service_name,
            service_price: 850.0,
            booking_type: BookingType::Scheduled,
            scheduled_time: booking.scheduled_time,
            location: booking.location,
            total_amount: None,
        };
        assert!(draft.validate().is_ok());

        draft.partner_id = "  ".to_string();
        assert_eq!(draft.validate().unwrap_err(), "partnerId is required");

        draft.partner_id = "p-1".to_string();
        draft.service_price = -1.0;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_search_matches() {
        let booking = Booking::from_document(doc("BK-42", json!({}))).unwrap();

        assert!(BookingSearch::default().matches(&booking));
        assert!(BookingSearch {
            text: Some("ac rep".to_string()),
            ..Default::default()
        }
        .matches(&booking));
        assert!(BookingSearch {
            text: Some("bk-4".to_string()),
            status: Some(BookingStatus::Pending),
            ..Default::default()
        }
        .matches(&booking));
        assert!(!BookingSearch {
            payment: Some(PaymentStatus::Paid),
            ..Default::default()
        }
        .matches(&booking));
        assert!(!BookingSearch {
            text: Some("plumbing".to_string()),
            ..Default::default()
        }
        .matches(&booking));
    }
}
