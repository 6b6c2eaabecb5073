// Database models and API types for the shop backend

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Category tree node. Roots have `parent_id` None; product categories carry
/// a price and own the sellable items.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_product: bool,
    pub price_cents: Option<i64>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

/// One unit of stock. `is_sold` flips false -> true exactly once and never
/// reverses; sold items are kept as sale history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub category_id: i64,
    pub private_data: String,
    pub is_sold: bool,
    pub is_new: bool,
}

/// Per-user ledger row. Spendable balance = top_up_cents - spent_cents.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub top_up_cents: i64,
    pub spent_cents: i64,
    pub btc_balance: f64,
    pub ltc_balance: f64,
    pub eth_balance: f64,
    pub last_refresh: Option<i64>,
}

/// Completed purchase, append-only.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BuyRecord {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub quantity: i64,
    pub price_total_cents: i64,
    pub sold_data: String,
    pub created_at: i64,
}

// ── API types ──

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryPage {
    pub categories: Vec<Category>,
    pub page: i64,
    pub max_page: i64,
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub user_id: i64,
    pub category_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub credited_cents: i64,
    pub spendable_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    /// Root-first path of category names; missing nodes are created.
    pub path: Vec<String>,
    #[serde(default)]
    pub is_product: bool,
    pub price_cents: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub price_cents: Option<i64>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub category_id: i64,
    pub payloads: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RestockResponse {
    pub added: i64,
}

#[derive(Debug, Serialize)]
pub struct AnnounceResponse {
    /// Product categories that had unannounced stock.
    pub restocked: Vec<i64>,
}
