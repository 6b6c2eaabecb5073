// The buy protocol: quote -> authorize -> reserve+debit+record -> deliver.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::CatalogStore;
use crate::database::DbPool;
use crate::error::ShopError;
use crate::ledger::LedgerService;
use crate::models::{BuyRecord, Category};
use crate::rates::DeliveryTransport;
use crate::reservation::{is_contention, ClaimedItem, ReservationEngine};

const MAX_PURCHASE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Quote {
    pub category: Category,
    pub quantity: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PurchaseOutcome {
    Completed,
    /// Some payloads could not be sent. The sale is final regardless; the
    /// failures are logged, never retried automatically, and never unwind
    /// the reservation or debit.
    PartialDeliveryFailure { failed: i64 },
}

#[derive(Debug, Serialize)]
pub struct PurchaseReceipt {
    pub order_id: i64,
    pub category_id: i64,
    pub quantity: i64,
    pub total_cents: i64,
    pub payloads: Vec<String>,
    #[serde(flatten)]
    pub outcome: PurchaseOutcome,
}

pub struct FulfillmentOrchestrator;

impl FulfillmentOrchestrator {
    /// Resolve the product category and total price for a prospective buy.
    pub async fn quote(
        pool: &DbPool,
        category_id: i64,
        quantity: i64,
    ) -> Result<Quote, ShopError> {
        if quantity < 1 {
            return Err(ShopError::InvalidQuantity(quantity));
        }

        let category = CatalogStore::get_category(pool, category_id).await?;
        let price_cents = match (category.is_product, category.price_cents) {
            (true, Some(price)) => price,
            _ => return Err(ShopError::NotAProduct(category_id)),
        };

        Ok(Quote {
            quantity,
            total_cents: price_cents * quantity,
            category,
        })
    }

    /// Run the full purchase. Fund gate and stock gate are independent:
    /// sufficient funds with an empty pool still rejects with OutOfStock.
    /// Claim, debit and the order record commit as one transaction; after
    /// that commit the sale is final and delivery is best effort.
    pub async fn purchase(
        pool: &DbPool,
        transport: &dyn DeliveryTransport,
        user_id: i64,
        category_id: i64,
        quantity: i64,
    ) -> Result<PurchaseReceipt, ShopError> {
        let quote = Self::quote(pool, category_id, quantity).await?;
        LedgerService::get_or_create_user(pool, user_id).await?;

        // Authorizing: fast pre-check. The authoritative funds check is the
        // conditional debit inside the transaction below.
        if !LedgerService::can_afford(pool, user_id, quote.total_cents).await? {
            let available = LedgerService::spendable_cents(pool, user_id).await?;
            return Err(ShopError::InsufficientFunds {
                needed_cents: quote.total_cents,
                available_cents: available,
            });
        }

        let (order_id, items) =
            Self::commit_sale(pool, user_id, &quote).await?;

        info!(
            "Reserved order {}: user {} bought {} x category {} for {} cents",
            order_id, user_id, quantity, category_id, quote.total_cents
        );

        // Delivering
        let mut failed = 0i64;
        for item in &items {
            if let Err(e) = transport.send(user_id, &item.private_data).await {
                error!(
                    "Delivery failed for item {} of order {}: {}",
                    item.id, order_id, e
                );
                failed += 1;
            }
        }

        let outcome = if failed == 0 {
            PurchaseOutcome::Completed
        } else {
            PurchaseOutcome::PartialDeliveryFailure { failed }
        };

        Ok(PurchaseReceipt {
            order_id,
            category_id,
            quantity,
            total_cents: quote.total_cents,
            payloads: items.into_iter().map(|i| i.private_data).collect(),
            outcome,
        })
    }

    /// A buyer's completed purchases, newest first.
    pub async fn order_history(
        pool: &DbPool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BuyRecord>, ShopError> {
        let orders = sqlx::query_as(
            "SELECT id, user_id, category_id, quantity, price_total_cents, sold_data, created_at \
             FROM buys WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    /// One transaction: claim stock, debit the ledger, append the order.
    /// Any failure drops the transaction, leaving no partial mutation.
    /// Store contention is retried a bounded number of times.
    async fn commit_sale(
        pool: &DbPool,
        user_id: i64,
        quote: &Quote,
    ) -> Result<(i64, Vec<ClaimedItem>), ShopError> {
        for attempt in 1..=MAX_PURCHASE_ATTEMPTS {
            let mut tx = pool.begin().await?;

            let result: Result<(i64, Vec<ClaimedItem>), ShopError> = async {
                let items =
                    ReservationEngine::claim_in_tx(&mut tx, quote.category.id, quote.quantity)
                        .await?;
                LedgerService::debit_in_tx(&mut tx, user_id, quote.total_cents).await?;

                let sold_data = items
                    .iter()
                    .map(|i| i.private_data.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");

                let order_id: i64 = sqlx::query_scalar(
                    "INSERT INTO buys \
                     (user_id, category_id, quantity, price_total_cents, sold_data, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
                )
                .bind(user_id)
                .bind(quote.category.id)
                .bind(quote.quantity)
                .bind(quote.total_cents)
                .bind(&sold_data)
                .bind(Utc::now().timestamp())
                .fetch_one(&mut *tx)
                .await?;

                Ok((order_id, items))
            }
            .await;

            match result {
                Ok(sale) => {
                    tx.commit().await?;
                    return Ok(sale);
                }
                Err(ShopError::Database(e)) if is_contention(&e) => {
                    drop(tx);
                    warn!(
                        "purchase contention for user {} on category {} (attempt {}): {}",
                        user_id, quote.category.id, attempt, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(ShopError::ReservationConflict)
    }
}
