//! Booking records, room allocation, and the storage seam between them.

mod allocator;
mod store;

pub use allocator::BookingAllocator;
pub use store::{Booking, BookingStore, InMemoryBookingStore, PaymentStatus};
