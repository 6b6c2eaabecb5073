// HTTP handlers for the surrounding bot/UI layer

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, ProductSpec};
use crate::error::ShopError;
use crate::fulfillment::{FulfillmentOrchestrator, PurchaseReceipt};
use crate::ledger::LedgerService;
use crate::models::{
    AnnounceResponse, BuyRequest, BuyRecord, Category, CategoryPage, CreateCategoryRequest, Item,
    PageQuery, RefreshRequest, RefreshResponse, RestockRequest, RestockResponse,
    UpdateCategoryRequest,
};
use crate::navigator::{CatalogNavigator, PAGE_SIZE};
use crate::rates::{UsdPrices, WalletBalances};
use crate::stock::StockIndex;
use crate::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_health = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();

    let status = if db_health { "healthy" } else { "unhealthy" };
    Json(serde_json::json!({
        "status": status,
        "database": if db_health { "up" } else { "down" },
    }))
}

// ── Catalog browsing ──

pub async fn get_roots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryPage>, ShopError> {
    let categories = CatalogNavigator::get_roots(&state.db, query.page).await?;
    let max_page = CatalogNavigator::max_roots_page(&state.db).await?;
    Ok(Json(CategoryPage {
        categories,
        page: query.page.max(0),
        max_page,
    }))
}

pub async fn get_children(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryPage>, ShopError> {
    CatalogStore::get_category(&state.db, category_id).await?;
    let categories = CatalogNavigator::get_children(&state.db, category_id, query.page).await?;
    let max_page = CatalogNavigator::max_children_page(&state.db, category_id).await?;
    Ok(Json(CategoryPage {
        categories,
        page: query.page.max(0),
        max_page,
    }))
}

pub async fn get_breadcrumb(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<i64>,
) -> Result<Json<Vec<Category>>, ShopError> {
    let trail = CatalogNavigator::get_breadcrumb(&state.db, category_id).await?;
    Ok(Json(trail))
}

// ── Purchase ──

pub async fn buy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<PurchaseReceipt>, ShopError> {
    info!(
        "Buy request: user {} wants {} x category {}",
        req.user_id, req.quantity, req.category_id
    );

    let receipt = FulfillmentOrchestrator::purchase(
        &state.db,
        state.transport.as_ref(),
        req.user_id,
        req.category_id,
        req.quantity,
    )
    .await?;

    Ok(Json(receipt))
}

pub async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<BuyRecord>>, ShopError> {
    let page = query.page.max(0);
    let orders =
        FulfillmentOrchestrator::order_history(&state.db, user_id, PAGE_SIZE, page * PAGE_SIZE)
            .await?;
    Ok(Json(orders))
}

// ── Balance refresh ──

pub async fn refresh_balance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ShopError> {
    LedgerService::get_or_create_user(&state.db, req.user_id).await?;

    if !LedgerService::refresh_cooldown(&state.db, req.user_id).await? {
        return Err(ShopError::CooldownActive);
    }

    // A failed source degrades to a zero contribution; the refresh itself
    // still completes (and the cooldown stamp stands).
    let balances = match state.balance_source.fetch(req.user_id).await {
        Ok(balances) => balances,
        Err(e) => {
            warn!("Balance source failed for user {}: {}", req.user_id, e);
            WalletBalances::default()
        }
    };
    let prices = match state.price_source.usd_prices().await {
        Ok(prices) => prices,
        Err(e) => {
            warn!("Price source failed: {}", e);
            UsdPrices {
                btc: 0.0,
                ltc: 0.0,
                eth: 0.0,
            }
        }
    };

    let credited_cents =
        LedgerService::apply_external_balances(&state.db, req.user_id, &balances, &prices).await?;
    let spendable_cents = LedgerService::spendable_cents(&state.db, req.user_id).await?;

    Ok(Json(RefreshResponse {
        credited_cents,
        spendable_cents,
    }))
}

// ── Admin ──

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, ShopError> {
    let path: Vec<&str> = req.path.iter().map(String::as_str).collect();
    let product = if req.is_product {
        Some(ProductSpec {
            price_cents: req.price_cents.unwrap_or(0),
            description: req.description.clone(),
        })
    } else {
        None
    };

    let category = CatalogStore::get_or_create_path(&state.db, &path, product).await?;
    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<i64>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ShopError> {
    if let Some(price_cents) = req.price_cents {
        CatalogStore::update_price(&state.db, category_id, price_cents).await?;
    }
    if let Some(ref description) = req.description {
        CatalogStore::update_description(&state.db, category_id, description).await?;
    }
    if let Some(ref image_ref) = req.image_ref {
        CatalogStore::update_image(&state.db, category_id, image_ref).await?;
    }

    let category = CatalogStore::get_category(&state.db, category_id).await?;
    Ok(Json(category))
}

/// Delete a category and its subtree. Refused while the subtree still has
/// unsold stock, so live offerings cannot vanish by accident.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ShopError> {
    CatalogStore::get_category(&state.db, category_id).await?;

    if StockIndex::has_available_items(&state.db, category_id).await? {
        return Err(ShopError::CategoryNotEmpty(category_id));
    }

    CatalogStore::delete_category(&state.db, category_id).await?;
    Ok(Json(serde_json::json!({ "deleted": category_id })))
}

pub async fn restock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<RestockResponse>, ShopError> {
    let added = CatalogStore::add_items(&state.db, req.category_id, &req.payloads).await?;
    Ok(Json(RestockResponse { added }))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<i64>,
) -> Result<Json<Vec<Item>>, ShopError> {
    let items = CatalogStore::list_items(&state.db, category_id).await?;
    Ok(Json(items))
}

/// Collect categories with unannounced stock and clear their flags.
pub async fn announce_restock(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnnounceResponse>, ShopError> {
    let restocked = CatalogStore::take_new_flags(&state.db).await?;
    Ok(Json(AnnounceResponse { restocked }))
}
