// Category tree and item inventory persistence

use tracing::info;

use crate::database::DbPool;
use crate::error::ShopError;
use crate::models::{Category, Item};

const CATEGORY_COLUMNS: &str =
    "id, name, parent_id, is_product, price_cents, description, image_ref";

/// Product attributes for the final node of a `get_or_create_path` call.
#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub price_cents: i64,
    pub description: Option<String>,
}

pub struct CatalogStore;

impl CatalogStore {
    pub async fn get_category(pool: &DbPool, id: i64) -> Result<Category, ShopError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ShopError::CategoryNotFound(id))
    }

    async fn find_child(
        pool: &DbPool,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Option<Category>, ShopError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE name = ?1 AND COALESCE(parent_id, 0) = COALESCE(?2, 0)"
        );
        let row = sqlx::query_as(&sql)
            .bind(name)
            .bind(parent_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Walk `path` root-first, creating missing nodes. Idempotent under
    /// concurrent callers: a lost insert race on (name, parent) is resolved
    /// by re-selecting the row the winner created. Only the final node
    /// carries product attributes.
    pub async fn get_or_create_path(
        pool: &DbPool,
        path: &[&str],
        product: Option<ProductSpec>,
    ) -> Result<Category, ShopError> {
        if path.is_empty() {
            return Err(ShopError::CategoryNotFound(0));
        }

        let mut parent_id: Option<i64> = None;
        let mut current: Option<Category> = None;

        for (idx, name) in path.iter().enumerate() {
            let is_last = idx + 1 == path.len();
            let spec = if is_last { product.as_ref() } else { None };

            let node = match Self::find_child(pool, parent_id, name).await? {
                Some(existing) => existing,
                None => {
                    sqlx::query(
                        "INSERT OR IGNORE INTO categories \
                         (name, parent_id, is_product, price_cents, description) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .bind(name)
                    .bind(parent_id)
                    .bind(spec.is_some())
                    .bind(spec.map(|s| s.price_cents))
                    .bind(spec.and_then(|s| s.description.clone()))
                    .execute(pool)
                    .await?;

                    // Present whether our insert or a concurrent one won.
                    let sql = format!(
                        "SELECT {CATEGORY_COLUMNS} FROM categories \
                         WHERE name = ?1 AND COALESCE(parent_id, 0) = COALESCE(?2, 0)"
                    );
                    sqlx::query_as(&sql)
                        .bind(name)
                        .bind(parent_id)
                        .fetch_one(pool)
                        .await?
                }
            };

            parent_id = Some(node.id);
            current = Some(node);
        }

        // path is non-empty, so the loop ran at least once
        Ok(current.expect("non-empty path produced no node"))
    }

    pub async fn update_price(pool: &DbPool, id: i64, price_cents: i64) -> Result<(), ShopError> {
        let result = sqlx::query("UPDATE categories SET price_cents = ?1 WHERE id = ?2")
            .bind(price_cents)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CategoryNotFound(id));
        }
        Ok(())
    }

    pub async fn update_description(
        pool: &DbPool,
        id: i64,
        description: &str,
    ) -> Result<(), ShopError> {
        let result = sqlx::query("UPDATE categories SET description = ?1 WHERE id = ?2")
            .bind(description)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CategoryNotFound(id));
        }
        Ok(())
    }

    pub async fn update_image(pool: &DbPool, id: i64, image_ref: &str) -> Result<(), ShopError> {
        let result = sqlx::query("UPDATE categories SET image_ref = ?1 WHERE id = ?2")
            .bind(image_ref)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CategoryNotFound(id));
        }
        Ok(())
    }

    /// Delete a category. Foreign keys cascade through descendant categories
    /// and their items; completed sales in `buys` are untouched.
    pub async fn delete_category(pool: &DbPool, id: i64) -> Result<(), ShopError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShopError::CategoryNotFound(id));
        }
        info!("Deleted category {} (cascaded to subtree)", id);
        Ok(())
    }

    /// Bulk restock: insert one unsold, unannounced item per payload.
    pub async fn add_items(
        pool: &DbPool,
        category_id: i64,
        payloads: &[String],
    ) -> Result<i64, ShopError> {
        let category = Self::get_category(pool, category_id).await?;
        if !category.is_product {
            return Err(ShopError::NotAProduct(category_id));
        }

        let mut tx = pool.begin().await?;
        for payload in payloads {
            sqlx::query("INSERT INTO items (category_id, private_data) VALUES (?1, ?2)")
                .bind(category_id)
                .bind(payload)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(
            "Restocked category {} with {} items",
            category_id,
            payloads.len()
        );
        Ok(payloads.len() as i64)
    }

    /// All items of a category, sold and unsold, for admin inspection.
    pub async fn list_items(pool: &DbPool, category_id: i64) -> Result<Vec<Item>, ShopError> {
        Self::get_category(pool, category_id).await?;
        let items = sqlx::query_as(
            "SELECT id, category_id, private_data, is_sold, is_new \
             FROM items WHERE category_id = ?1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    pub async fn unsold_count(pool: &DbPool, category_id: i64) -> Result<i64, ShopError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE category_id = ?1 AND is_sold = 0",
        )
        .bind(category_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Category ids with unannounced stock; clears the flags so the next
    /// restock announcement starts fresh.
    pub async fn take_new_flags(pool: &DbPool) -> Result<Vec<i64>, ShopError> {
        let mut tx = pool.begin().await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT category_id FROM items WHERE is_new = 1 ORDER BY category_id",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE items SET is_new = 0 WHERE is_new = 1")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids)
    }
}
