//! Hotel catalog.
//!
//! The catalog is read-only as far as the booking flow is concerned: hotels
//! are seeded at startup and looked up by id when allocating rooms and
//! opening checkout sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InnkeeperError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Nightly rate in minor currency units (cents).
    pub price_cents: i64,
    /// Gateway price plan to bill against. Hotels without one fall back to
    /// an ad-hoc line item at checkout.
    #[serde(default)]
    pub price_plan_ref: Option<String>,
}

#[async_trait]
pub trait HotelStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Hotel>>;
}

/// In-memory catalog backed by a `HashMap`. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct InMemoryHotelStore {
    inner: Arc<RwLock<HashMap<String, Hotel>>>,
}

impl InMemoryHotelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, hotels: impl IntoIterator<Item = Hotel>) -> Result<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| InnkeeperError::internal("hotel store lock poisoned"))?;
        for hotel in hotels {
            map.insert(hotel.id.clone(), hotel);
        }
        Ok(())
    }

    pub fn insert(&self, hotel: Hotel) -> Result<()> {
        self.seed([hotel])
    }
}

#[async_trait]
impl HotelStore for InMemoryHotelStore {
    async fn get(&self, id: &str) -> Result<Option<Hotel>> {
        let map = self
            .inner
            .read()
            .map_err(|_| InnkeeperError::internal("hotel store lock poisoned"))?;
        Ok(map.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_and_get() {
        let store = InMemoryHotelStore::new();
        store
            .insert(Hotel {
                id: "hotel_1".to_string(),
                name: "Harbor View".to_string(),
                location: "Lisbon".to_string(),
                price_cents: 10_000,
                price_plan_ref: Some("price_123".to_string()),
            })
            .unwrap();

        let hotel = store.get("hotel_1").await.unwrap().unwrap();
        assert_eq!(hotel.name, "Harbor View");
        assert_eq!(hotel.price_cents, 10_000);

        assert!(store.get("hotel_2").await.unwrap().is_none());
    }
}
