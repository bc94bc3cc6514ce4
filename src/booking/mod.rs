//! Booking lifecycle: models, persistence and the lifecycle service

pub mod memory;
pub mod model;
pub mod service;
pub mod store;

pub use memory::InMemoryBookingStore;
pub use model::{
    rental_days, Booking, BookingChange, BookingStatus, CollectionMethod, CollectionStamp,
    CreateBookingRequest, DisputeRequest, Expected, ListBookingsQuery, NewBooking, PartyRole,
    PaymentStatus, TokenFixture,
};
pub use service::BookingService;
pub use store::{BookingStore, PgBookingStore};
