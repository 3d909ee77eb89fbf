pub mod bookings;
pub mod catalog;
pub mod media;
pub mod partners;
pub mod stats;
pub mod users;
