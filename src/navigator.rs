// Stock-aware catalog browsing: paginated listings and breadcrumbs.

use crate::database::DbPool;
use crate::error::ShopError;
use crate::models::Category;
use crate::stock::IN_STOCK_CTE;

pub const PAGE_SIZE: i64 = 10;

const CATEGORY_COLUMNS: &str =
    "c.id, c.name, c.parent_id, c.is_product, c.price_cents, c.description, c.image_ref";

// The listing and max-page queries for a level must share one predicate,
// otherwise the last page can end up empty or out of range.
const ROOTS_FILTER: &str = "c.parent_id IS NULL AND c.id IN (SELECT id FROM in_stock)";
const CHILDREN_FILTER: &str = "c.parent_id = ?1 AND c.id IN (SELECT id FROM in_stock)";

pub struct CatalogNavigator;

impl CatalogNavigator {
    /// Root categories with purchasable stock, ordered by id. Filtering
    /// happens before pagination so page boundaries stay correct no matter
    /// how many categories are sold out.
    pub async fn get_roots(pool: &DbPool, page: i64) -> Result<Vec<Category>, ShopError> {
        let page = page.max(0);
        let sql = format!(
            "{IN_STOCK_CTE} SELECT {CATEGORY_COLUMNS} FROM categories c \
             WHERE {ROOTS_FILTER} ORDER BY c.id LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query_as(&sql)
            .bind(PAGE_SIZE)
            .bind(page * PAGE_SIZE)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn max_roots_page(pool: &DbPool) -> Result<i64, ShopError> {
        let sql = format!("{IN_STOCK_CTE} SELECT COUNT(*) FROM categories c WHERE {ROOTS_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(last_page(count))
    }

    /// Children of `parent_id` with purchasable stock, ordered by id.
    pub async fn get_children(
        pool: &DbPool,
        parent_id: i64,
        page: i64,
    ) -> Result<Vec<Category>, ShopError> {
        let page = page.max(0);
        let sql = format!(
            "{IN_STOCK_CTE} SELECT {CATEGORY_COLUMNS} FROM categories c \
             WHERE {CHILDREN_FILTER} ORDER BY c.id LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query_as(&sql)
            .bind(parent_id)
            .bind(PAGE_SIZE)
            .bind(page * PAGE_SIZE)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn max_children_page(pool: &DbPool, parent_id: i64) -> Result<i64, ShopError> {
        let sql =
            format!("{IN_STOCK_CTE} SELECT COUNT(*) FROM categories c WHERE {CHILDREN_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(parent_id)
            .fetch_one(pool)
            .await?;
        Ok(last_page(count))
    }

    /// Root-first path of nodes for `category_id`. Walks parent_id upward
    /// iteratively; a dangling parent reference ends the walk instead of
    /// failing.
    pub async fn get_breadcrumb(
        pool: &DbPool,
        category_id: i64,
    ) -> Result<Vec<Category>, ShopError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = ?1"
        );

        let mut trail: Vec<Category> = Vec::new();
        let mut next: Option<i64> = Some(category_id);

        while let Some(id) = next {
            let node: Option<Category> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await?;
            match node {
                Some(node) => {
                    next = node.parent_id;
                    trail.push(node);
                }
                None if trail.is_empty() => return Err(ShopError::CategoryNotFound(id)),
                None => break,
            }
        }

        trail.reverse();
        Ok(trail)
    }
}

fn last_page(count: i64) -> i64 {
    if count <= 0 {
        0
    } else {
        (count + PAGE_SIZE - 1) / PAGE_SIZE - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_matches_listing_boundaries() {
        assert_eq!(last_page(0), 0);
        assert_eq!(last_page(1), 0);
        assert_eq!(last_page(PAGE_SIZE), 0);
        assert_eq!(last_page(PAGE_SIZE + 1), 1);
        assert_eq!(last_page(PAGE_SIZE * 3), 2);
    }
}
