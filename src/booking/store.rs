use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{InnkeeperError, Result};

/// Payment lifecycle of a booking. The only legal transition is
/// `Pending -> Paid`, applied through [`BookingStore::mark_paid_if_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PAID")]
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub hotel_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Unique across all bookings, assigned by the allocator.
    pub room_number: u32,
    pub payment_status: PaymentStatus,
    /// Total price in minor currency units (nights x nightly rate).
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn nights(&self) -> u32 {
        let days = self.check_out.signed_duration_since(self.check_in).num_days();
        days.max(0) as u32
    }
}

/// Persistence seam for bookings.
///
/// Implementations must enforce room-number uniqueness inside `insert` and
/// make `mark_paid_if_pending` an atomic conditional write, since both are
/// hit by concurrent callers.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking. Fails with `Conflict` if the room number or id
    /// is already taken.
    async fn insert(&self, booking: &Booking) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>>;

    /// All bookings for a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>>;

    /// Highest room number currently assigned, if any bookings exist.
    async fn max_room_number(&self) -> Result<Option<u32>>;

    /// Transition the booking to PAID only if it is currently PENDING.
    ///
    /// Returns `Ok(true)` when the transition was applied, `Ok(false)` when
    /// the booking was already PAID (a no-op), and `NotFound` when there is
    /// no such booking.
    async fn mark_paid_if_pending(&self, id: Uuid) -> Result<bool>;
}

/// In-memory store used in tests and single-process deployments. Cloning
/// shares the underlying map.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Booking>>> {
        self.inner
            .write()
            .map_err(|_| InnkeeperError::internal("booking store lock poisoned"))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Booking>>> {
        self.inner
            .read()
            .map_err(|_| InnkeeperError::internal("booking store lock poisoned"))
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<()> {
        let mut map = self.write()?;
        if map.contains_key(&booking.id) {
            return Err(InnkeeperError::conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        if map.values().any(|b| b.room_number == booking.room_number) {
            return Err(InnkeeperError::conflict(format!(
                "room {} is already booked",
                booking.room_number
            )));
        }
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .read()?
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn max_room_number(&self) -> Result<Option<u32>> {
        Ok(self.read()?.values().map(|b| b.room_number).max())
    }

    async fn mark_paid_if_pending(&self, id: Uuid) -> Result<bool> {
        let mut map = self.write()?;
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| InnkeeperError::not_found(format!("booking {id}")))?;
        if booking.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }
        booking.payment_status = PaymentStatus::Paid;
        Ok(true)
    }
}
