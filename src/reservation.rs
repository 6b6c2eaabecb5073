// Atomic stock reservation.
//
// The claim is one conditional bulk update: flip up to `quantity` unsold
// rows of the category inside the calling transaction and verify the
// affected-row count. Two concurrent claims are ordered by the store's
// write lock; neither can see the other's in-flight rows as unsold. The
// read-count-then-update-rows-one-by-one pattern is exactly the race this
// module exists to close.

use sqlx::{Sqlite, Transaction};
use tracing::warn;

use crate::database::DbPool;
use crate::error::ShopError;

const MAX_CLAIM_ATTEMPTS: u32 = 3;

const CLAIM_SQL: &str = "UPDATE items SET is_sold = 1 \
     WHERE id IN ( \
         SELECT id FROM items \
         WHERE category_id = ?1 AND is_sold = 0 \
         ORDER BY id \
         LIMIT ?2 \
     ) \
     RETURNING id, private_data";

/// An item claimed by a reservation, carrying the payload to deliver.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimedItem {
    pub id: i64,
    pub private_data: String,
}

pub struct ReservationEngine;

impl ReservationEngine {
    /// Claim exactly `quantity` unsold items within `tx`, lowest ids first.
    ///
    /// On shortfall returns `OutOfStock` with the claim NOT committed; the
    /// caller must drop (roll back) the transaction on any error from here.
    pub async fn claim_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        category_id: i64,
        quantity: i64,
    ) -> Result<Vec<ClaimedItem>, ShopError> {
        if quantity < 1 {
            return Err(ShopError::InvalidQuantity(quantity));
        }

        let mut claimed: Vec<ClaimedItem> = sqlx::query_as(CLAIM_SQL)
            .bind(category_id)
            .bind(quantity)
            .fetch_all(&mut **tx)
            .await?;

        if (claimed.len() as i64) != quantity {
            // Whatever the update reached is all the stock there was.
            return Err(ShopError::OutOfStock {
                requested: quantity,
                available: claimed.len() as i64,
            });
        }

        claimed.sort_by_key(|item| item.id);
        Ok(claimed)
    }

    /// Standalone reservation: own transaction, bounded retry on store
    /// contention. Not idempotent; callers invoke once per logical purchase.
    pub async fn reserve(
        pool: &DbPool,
        category_id: i64,
        quantity: i64,
    ) -> Result<Vec<ClaimedItem>, ShopError> {
        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            let mut tx = pool.begin().await?;
            match Self::claim_in_tx(&mut tx, category_id, quantity).await {
                Ok(items) => {
                    tx.commit().await?;
                    return Ok(items);
                }
                Err(ShopError::Database(e)) if is_contention(&e) => {
                    drop(tx);
                    warn!(
                        "reservation contention on category {} (attempt {}): {}",
                        category_id, attempt, e
                    );
                }
                // Rolls back via tx drop; no partial claim survives.
                Err(e) => return Err(e),
            }
        }
        Err(ShopError::ReservationConflict)
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED family: safe to retry the whole transaction.
pub(crate) fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("517"))
                || db.message().contains("database is locked")
        }
        _ => false,
    }
}
