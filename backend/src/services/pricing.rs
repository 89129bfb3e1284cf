//! Item price book

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{validate_rate, ItemPrice, SetItemPriceInput};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LockKey, Store, StoreState, UnitOfWork, Write};

/// Resolve a line rate: explicit, then the price book, then `fallback`
pub fn resolve_rate(
    state: &StoreState,
    explicit: Option<Decimal>,
    item_id: Uuid,
    pickup: Option<&str>,
    fallback: Option<Decimal>,
) -> AppResult<Decimal> {
    let rate = explicit
        .or_else(|| state.price_for(item_id, pickup))
        .or(fallback)
        .ok_or_else(|| {
            AppError::validation("rate", format!("No rate given and no price set for item {}", item_id))
        })?;
    validate_rate(rate).map_err(|e| AppError::validation("rate", e))?;
    Ok(rate)
}

/// Sets and reads item prices
#[derive(Clone)]
pub struct PricingService {
    store: Arc<Store>,
}

impl PricingService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Set the rate of an item, optionally for one pickup location
    pub async fn set_price(&self, input: SetItemPriceInput) -> AppResult<ItemPrice> {
        validate_rate(input.rate).map_err(|e| AppError::validation("rate", e))?;
        self.store.read(|state| state.item(input.item_id).map(|_| ()))?;

        let locks = self.store.lock([LockKey::Price(input.item_id)]).await?;
        let price = ItemPrice {
            item_id: input.item_id,
            pickup: input.pickup,
            rate: input.rate,
            updated_at: Utc::now(),
        };
        let mut uow = UnitOfWork::new();
        uow.write(Write::Price(price.clone()));
        self.store.commit(&locks, uow).await?;

        tracing::info!(item_id = %price.item_id, rate = %price.rate, "Price set");
        Ok(price)
    }

    /// Effective rate for an item at a pickup location
    pub fn get_price(&self, item_id: Uuid, pickup: Option<&str>) -> AppResult<Decimal> {
        self.store.read(|state| {
            state.item(item_id)?;
            state
                .price_for(item_id, pickup)
                .ok_or_else(|| AppError::NotFound(format!("Price for item {}", item_id)))
        })
    }

    pub fn list_prices(&self, item_id: Option<Uuid>) -> Vec<ItemPrice> {
        self.store.read(|state| {
            let mut prices: Vec<ItemPrice> = state
                .prices
                .values()
                .filter(|p| item_id.map_or(true, |id| p.item_id == id))
                .cloned()
                .collect();
            prices.sort_by(|a, b| (a.item_id, &a.pickup).cmp(&(b.item_id, &b.pickup)));
            prices
        })
    }
}
