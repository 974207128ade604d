//! Google Calendar integration for Tempo.
//!
//! Provides the Calendar API client and the session-holding
//! [`CalendarManager`] façade.

pub mod client;
pub mod error;
pub mod manager;
pub mod types;

pub use client::CalendarClient;
pub use error::CalendarError;
pub use manager::CalendarManager;
pub use types::{Attendee, Event, EventStatus, EventTime, ResponseStatus};
