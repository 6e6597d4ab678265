//! Request boundary: form body in, JSON-ready response out.
//!
//! Everything that reaches [`BookingService`] has already been validated here.

use crate::booking::BookingService;
use crate::error::{Error, Result};
use crate::types::Ticket;
use serde::Serialize;

pub const MSG_SECURED: &str = "Ticket secured";
pub const MSG_CONFLICT: &str = "Seat has been booked by someone else.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub code: u16,
    pub message: String,
}

/// Seat echoed back to the caller; `id` only on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub film: String,
    pub room: u32,
    pub seat: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingResponse {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TicketData>,
}

impl BookingResponse {
    fn new(code: u16, message: impl Into<String>, data: Option<TicketData>) -> Self {
        Self {
            meta: Meta {
                code,
                message: message.into(),
            },
            data,
        }
    }

    pub fn status(&self) -> u16 {
        self.meta.code
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn parse_number(field: &'static str, value: Option<String>) -> Result<u32> {
    let value = value.ok_or(Error::MissingField { field })?;
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidNumber { field, value })
}

/// Decodes `film=batman&room=2&seat=7` into a [`Ticket`].
///
/// Later duplicates of a field win; unknown fields are ignored.
pub fn parse_booking_form(body: &str) -> Result<Ticket> {
    let mut film = None;
    let mut room = None;
    let mut seat = None;

    for pair in body.trim().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value);
        match decode_component(key).as_str() {
            "film" => film = Some(value),
            "room" => room = Some(value),
            "seat" => seat = Some(value),
            _ => {}
        }
    }

    let film = film.ok_or(Error::MissingField { field: "film" })?;
    if film.trim().is_empty() {
        return Err(Error::EmptyFilm);
    }
    let room = parse_number("room", room)?;
    let seat = parse_number("seat", seat)?;
    Ok(Ticket::new(film, room, seat))
}

/// Parses `body`, books the seat and maps the outcome to a response.
pub async fn handle_booking(service: &BookingService, body: &str) -> BookingResponse {
    let ticket = match parse_booking_form(body) {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::warn!(error = %e, "[Handler] rejecting malformed booking request");
            return BookingResponse::new(400, e.to_string(), None);
        }
    };

    match service.reserve(&ticket).await {
        Some(record) => BookingResponse::new(
            200,
            MSG_SECURED,
            Some(TicketData {
                id: Some(record.id),
                film: record.film,
                room: record.room,
                seat: record.seat,
            }),
        ),
        None => BookingResponse::new(
            400,
            MSG_CONFLICT,
            Some(TicketData {
                id: None,
                film: ticket.film,
                room: ticket.room,
                seat: ticket.seat,
            }),
        ),
    }
}
