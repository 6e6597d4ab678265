//! Types for seat booking: the identity that must not repeat and the record persisted for it.

use serde::Serialize;
use std::fmt;

/// Scope key used for seat bookings unless configured otherwise.
pub const DEFAULT_BOOKING_SCOPE: &str = "bookseat";

/// Identity of one seat: what may be booked at most once.
///
/// Compared and hashed by content only, so an owned `Ticket`, a `&Ticket`,
/// a `Box<Ticket>` or an `Arc<Ticket>` with equal fields are the same seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket {
    pub film: String,
    pub room: u32,
    pub seat: u32,
}

impl Ticket {
    pub fn new(film: impl Into<String>, room: u32, seat: u32) -> Self {
        Self {
            film: film.into(),
            room,
            seat,
        }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} room={} seat={}", self.film, self.room, self.seat)
    }
}

/// A booking appended to the ticket store after admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRecord {
    pub id: u32,
    pub film: String,
    pub room: u32,
    pub seat: u32,
}

impl BookingRecord {
    pub fn new(id: u32, ticket: &Ticket) -> Self {
        Self {
            id,
            film: ticket.film.clone(),
            room: ticket.room,
            seat: ticket.seat,
        }
    }

    /// The seat this record books.
    pub fn ticket(&self) -> Ticket {
        Ticket::new(self.film.clone(), self.room, self.seat)
    }
}
