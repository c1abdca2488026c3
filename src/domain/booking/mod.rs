//! Booking bounded context - holds a court for a time range

pub mod aggregate;
pub mod event;
pub mod repository;
pub mod value_object;

pub use aggregate::Booking;
pub use event::{BookingCancelled, BookingConfirmed, BookingCreated, BookingEvent};
pub use repository::{
    BookingFilter, BookingStore, ConfirmOutcome, PageRequest, ProcessedEvent, StatusChange,
};
pub use value_object::{BookingStatus, TimeRange, Transition};

#[cfg(test)]
pub use repository::MockBookingStore;
