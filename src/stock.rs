// Derived stock availability over the category tree.
//
// Both queries are recomputed per call. Stock changes with every sale and
// restock; a cached index would keep sold-out subtrees browsable or hide
// freshly restocked ones.

use std::collections::HashSet;

use crate::database::DbPool;
use crate::error::ShopError;

/// Seed set: product categories with at least one unsold item, then walk
/// parent_id upward to the roots. Shared with the navigator so listing and
/// page-count queries filter on the identical set.
pub(crate) const IN_STOCK_CTE: &str = "WITH RECURSIVE in_stock(id, parent_id) AS ( \
     SELECT c.id, c.parent_id FROM categories c \
     WHERE c.is_product = 1 \
       AND EXISTS (SELECT 1 FROM items i WHERE i.category_id = c.id AND i.is_sold = 0) \
     UNION \
     SELECT p.id, p.parent_id FROM categories p \
     JOIN in_stock s ON p.id = s.parent_id \
 )";

pub struct StockIndex;

impl StockIndex {
    /// Ids of all categories whose subtree currently holds purchasable
    /// stock: in-stock products plus every ancestor up to the root.
    pub async fn categories_with_stock(pool: &DbPool) -> Result<HashSet<i64>, ShopError> {
        let sql = format!("{IN_STOCK_CTE} SELECT id FROM in_stock");
        let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
        Ok(ids.into_iter().collect())
    }

    /// Does this node's subtree contain any unsold item? Downward walk,
    /// used for single-node checks like admin delete eligibility.
    pub async fn has_available_items(pool: &DbPool, category_id: i64) -> Result<bool, ShopError> {
        let unsold: i64 = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS ( \
                 SELECT ?1 \
                 UNION \
                 SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id \
             ) \
             SELECT COUNT(*) FROM items \
             WHERE is_sold = 0 AND category_id IN (SELECT id FROM subtree)",
        )
        .bind(category_id)
        .fetch_one(pool)
        .await?;
        Ok(unsold > 0)
    }
}
