use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::booking::store::{Booking, BookingStore, PaymentStatus};
use crate::catalog::HotelStore;
use crate::error::{InnkeeperError, Result};

/// Rooms start at 101 when the store is empty.
const FIRST_ROOM: u32 = 101;

/// Insert retries before giving up when racing other allocators for a room
/// number. Each retry re-reads the current maximum, so a loss only happens
/// when another allocation landed first.
const MAX_ALLOCATION_ATTEMPTS: u32 = 10;

/// Creates bookings: validates the request, prices the stay, and assigns a
/// unique room number.
pub struct BookingAllocator<B, H> {
    bookings: B,
    hotels: H,
}

impl<B, H> BookingAllocator<B, H>
where
    B: BookingStore,
    H: HotelStore,
{
    pub fn new(bookings: B, hotels: H) -> Self {
        Self { bookings, hotels }
    }

    /// Create a PENDING booking for the given stay.
    ///
    /// Dates are accepted as `YYYY-MM-DD` strings. The check-in must not be
    /// in the past and the check-out must be after the check-in.
    pub async fn allocate(
        &self,
        user_id: &str,
        hotel_id: &str,
        check_in: &str,
        check_out: &str,
    ) -> Result<Booking> {
        if user_id.is_empty() {
            return Err(InnkeeperError::unauthorized("user authentication required"));
        }

        let check_in = parse_date(check_in, "check_in")?;
        let check_out = parse_date(check_out, "check_out")?;

        let today = Utc::now().date_naive();
        if check_in < today {
            return Err(InnkeeperError::bad_request("check-in date is in the past"));
        }
        if check_out <= check_in {
            return Err(InnkeeperError::bad_request(
                "check-out must be after check-in",
            ));
        }

        let hotel = self
            .hotels
            .get(hotel_id)
            .await?
            .ok_or_else(|| InnkeeperError::not_found(format!("hotel {hotel_id}")))?;

        let nights = check_out.signed_duration_since(check_in).num_days();
        let total_cents = nights * hotel.price_cents;

        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let room_number = match self.bookings.max_room_number().await? {
                Some(max) => max + 1,
                None => FIRST_ROOM,
            };

            let booking = Booking {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                hotel_id: hotel.id.clone(),
                check_in,
                check_out,
                room_number,
                payment_status: PaymentStatus::Pending,
                total_cents,
                created_at: Utc::now(),
            };

            match self.bookings.insert(&booking).await {
                Ok(()) => {
                    tracing::info!(
                        booking_id = %booking.id,
                        hotel_id = %hotel.id,
                        room = room_number,
                        total_cents,
                        "Booking created"
                    );
                    return Ok(booking);
                }
                Err(InnkeeperError::Conflict(_)) => {
                    tracing::debug!(room = room_number, attempt, "Room taken, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        Err(InnkeeperError::conflict(
            "could not allocate a room, please retry",
        ))
    }
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| InnkeeperError::bad_request(format!("invalid {field} date: {value}")))
}
