#![forbid(unsafe_code)]

pub mod booking;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod handler;
pub mod types;

pub use booking::{BookingService, InMemoryTicketStore, TicketStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dedupe::DedupCache;
pub use error::{Error, Result};
pub use handler::{handle_booking, parse_booking_form, BookingResponse};
pub use types::{BookingRecord, Ticket, DEFAULT_BOOKING_SCOPE};
