// Shop backend: category tree, stock-aware browsing, and race-free
// order fulfillment for a pool of pre-loaded digital goods.

use std::sync::Arc;

use crate::database::DbPool;
use crate::rates::{BalanceSource, DeliveryTransport, PriceSource};

pub mod catalog;
pub mod database;
pub mod error;
pub mod fulfillment;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod navigator;
pub mod rates;
pub mod reservation;
pub mod stock;

/// Application state shared across handlers. The pool is the sole shared
/// mutable resource; the collaborators are injected so the bot gateway and
/// the external price/balance APIs stay swappable.
pub struct AppState {
    pub db: DbPool,
    pub transport: Arc<dyn DeliveryTransport>,
    pub balance_source: Arc<dyn BalanceSource>,
    pub price_source: Arc<dyn PriceSource>,
}
