#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use shopbot_backend::catalog::{CatalogStore, ProductSpec};
use shopbot_backend::database::{Database, DbPool};
use shopbot_backend::ledger::LedgerService;
use shopbot_backend::models::Category;
use shopbot_backend::rates::{DeliveryError, DeliveryTransport};

pub async fn test_pool() -> DbPool {
    Database::init_in_memory()
        .await
        .expect("in-memory database")
}

/// Create a product category at `path` with `stock` unsold items.
pub async fn seed_product(
    pool: &DbPool,
    path: &[&str],
    price_cents: i64,
    stock: usize,
) -> Category {
    let category = CatalogStore::get_or_create_path(
        pool,
        path,
        Some(ProductSpec {
            price_cents,
            description: None,
        }),
    )
    .await
    .expect("create product category");

    if stock > 0 {
        let name = path.last().expect("non-empty path");
        let payloads: Vec<String> = (0..stock).map(|i| format!("{name}-payload-{i}")).collect();
        CatalogStore::add_items(pool, category.id, &payloads)
            .await
            .expect("restock");
    }

    category
}

pub async fn fund_user(pool: &DbPool, user_id: i64, cents: i64) {
    LedgerService::get_or_create_user(pool, user_id)
        .await
        .expect("create user");
    sqlx::query("UPDATE users SET top_up_cents = top_up_cents + ?1 WHERE id = ?2")
        .bind(cents)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("fund user");
}

/// Transport that records every delivered payload.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send(&self, user_id: i64, payload: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .expect("transport mutex")
            .push((user_id, payload.to_string()));
        Ok(())
    }
}

/// Transport whose sends always fail, for sale-is-final checks.
pub struct FailingTransport;

#[async_trait]
impl DeliveryTransport for FailingTransport {
    async fn send(&self, _user_id: i64, _payload: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Send("gateway unreachable".to_string()))
    }
}
