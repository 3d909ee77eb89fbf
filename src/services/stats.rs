use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Booking, BookingStatus, PaymentStatus, Service, ServiceCategory};

/// Booking counters for the dashboard tiles, derived from a feed's current
/// list. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Sum of `servicePrice` over paid bookings.
    pub revenue: f64,
    /// Sum of `servicePrice` over bookings still awaiting payment.
    pub pending_revenue: f64,
}

impl BookingStats {
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        let mut stats = Self {
            total: bookings.len(),
            ..Default::default()
        };

        for booking in bookings {
            match booking.status {
                BookingStatus::Pending => stats.pending += 1,
                BookingStatus::Accepted => stats.accepted += 1,
                BookingStatus::InProgress => stats.in_progress += 1,
                BookingStatus::Completed => stats.completed += 1,
                BookingStatus::Cancelled => stats.cancelled += 1,
            }
            match booking.payment_status {
                PaymentStatus::Paid => stats.revenue += booking.service_price,
                PaymentStatus::Pending => stats.pending_revenue += booking.service_price,
            }
        }

        stats
    }

    pub fn count(&self, status: BookingStatus) -> usize {
        match status {
            BookingStatus::Pending => self.pending,
            BookingStatus::Accepted => self.accepted,
            BookingStatus::InProgress => self.in_progress,
            BookingStatus::Completed => self.completed,
            BookingStatus::Cancelled => self.cancelled,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_category: BTreeMap<ServiceCategory, usize>,
}

impl ServiceStats {
    pub fn from_services(services: &[Service]) -> Self {
        let mut stats = Self {
            total: services.len(),
            ..Default::default()
        };
        for service in services {
            if service.active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            *stats.by_category.entry(service.category).or_default() += 1;
        }
        stats
    }
}

/// Everything the admin overview shows in one payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub bookings: BookingStats,
    pub services: ServiceStats,
    pub partners: usize,
}
