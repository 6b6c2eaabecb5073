mod common;

use common::{seed_product, test_pool};

use shopbot_backend::catalog::{CatalogStore, ProductSpec};
use shopbot_backend::error::ShopError;
use shopbot_backend::navigator::{CatalogNavigator, PAGE_SIZE};
use shopbot_backend::reservation::ReservationEngine;
use shopbot_backend::stock::StockIndex;

#[tokio::test]
async fn get_or_create_path_is_idempotent() {
    let pool = test_pool().await;

    let first = CatalogStore::get_or_create_path(
        &pool,
        &["Tea", "Green", "Sencha"],
        Some(ProductSpec {
            price_cents: 500,
            description: Some("loose leaf".to_string()),
        }),
    )
    .await
    .unwrap();

    let second = CatalogStore::get_or_create_path(
        &pool,
        &["Tea", "Green", "Sencha"],
        Some(ProductSpec {
            price_cents: 500,
            description: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.is_product);
    assert_eq!(first.price_cents, Some(500));

    // Intermediate nodes are plain categories.
    let trail = CatalogNavigator::get_breadcrumb(&pool, first.id).await.unwrap();
    assert_eq!(trail.len(), 3);
    assert!(!trail[0].is_product);
    assert!(!trail[1].is_product);
}

#[tokio::test]
async fn breadcrumb_is_root_first() {
    let pool = test_pool().await;
    let product = seed_product(&pool, &["A", "B", "C"], 100, 1).await;

    let trail = CatalogNavigator::get_breadcrumb(&pool, product.id).await.unwrap();
    let names: Vec<&str> = trail.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert_eq!(trail[2].id, product.id);
    assert_eq!(trail[0].parent_id, None);
}

#[tokio::test]
async fn breadcrumb_of_unknown_category_fails() {
    let pool = test_pool().await;
    let err = CatalogNavigator::get_breadcrumb(&pool, 9999).await.unwrap_err();
    assert!(matches!(err, ShopError::CategoryNotFound(9999)));
}

#[tokio::test]
async fn roots_hide_sold_out_subtrees() {
    let pool = test_pool().await;
    let stocked = seed_product(&pool, &["Coffee", "Beans"], 300, 2).await;
    seed_product(&pool, &["Empty", "Shelf"], 300, 0).await;

    let roots = CatalogNavigator::get_roots(&pool, 0).await.unwrap();
    let names: Vec<&str> = roots.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Coffee"]);

    let in_stock = StockIndex::categories_with_stock(&pool).await.unwrap();
    assert!(in_stock.contains(&stocked.id));
    assert!(in_stock.contains(&roots[0].id));
}

#[tokio::test]
async fn children_listing_filters_stock() {
    let pool = test_pool().await;
    let stocked = seed_product(&pool, &["Tea", "Green"], 200, 1).await;
    seed_product(&pool, &["Tea", "Black"], 200, 0).await;

    let tea = CatalogNavigator::get_breadcrumb(&pool, stocked.id).await.unwrap()[0].clone();
    let children = CatalogNavigator::get_children(&pool, tea.id, 0).await.unwrap();
    let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Green"]);
}

#[tokio::test]
async fn pagination_has_no_dups_and_no_gaps() {
    let pool = test_pool().await;

    let mut expected = Vec::new();
    for i in 0..23 {
        let name = format!("Root-{i:02}");
        let cat = seed_product(&pool, &[name.as_str()], 100, 1).await;
        expected.push(cat.id);
    }
    expected.sort();

    let max_page = CatalogNavigator::max_roots_page(&pool).await.unwrap();
    assert_eq!(max_page, 2);

    let mut seen = Vec::new();
    for page in 0..=max_page {
        let roots = CatalogNavigator::get_roots(&pool, page).await.unwrap();
        assert!(roots.len() as i64 <= PAGE_SIZE);
        if page < max_page {
            assert_eq!(roots.len() as i64, PAGE_SIZE);
        } else {
            assert!(!roots.is_empty());
        }
        seen.extend(roots.iter().map(|c| c.id));
    }

    assert_eq!(seen, expected);

    // Pages past the end are empty rather than an error.
    let past = CatalogNavigator::get_roots(&pool, max_page + 1).await.unwrap();
    assert!(past.is_empty());
}

#[tokio::test]
async fn max_page_tracks_the_stock_filter() {
    let pool = test_pool().await;

    let mut ids = Vec::new();
    for i in 0..11 {
        let name = format!("Shelf-{i:02}");
        let cat = seed_product(&pool, &[name.as_str()], 100, 1).await;
        ids.push(cat.id);
    }
    assert_eq!(CatalogNavigator::max_roots_page(&pool).await.unwrap(), 1);

    // Sell out one category: the filtered count drops to 10 and the last
    // page collapses with it.
    ReservationEngine::reserve(&pool, ids[0], 1).await.unwrap();
    assert_eq!(CatalogNavigator::max_roots_page(&pool).await.unwrap(), 0);
    let roots = CatalogNavigator::get_roots(&pool, 0).await.unwrap();
    assert_eq!(roots.len() as i64, PAGE_SIZE);
}

#[tokio::test]
async fn empty_catalog_pages_cleanly() {
    let pool = test_pool().await;
    assert_eq!(CatalogNavigator::max_roots_page(&pool).await.unwrap(), 0);
    assert!(CatalogNavigator::get_roots(&pool, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_cascades_to_descendants_and_items() {
    let pool = test_pool().await;
    let product = seed_product(&pool, &["Tea", "Green", "Sencha"], 500, 0).await;
    let trail = CatalogNavigator::get_breadcrumb(&pool, product.id).await.unwrap();
    let root_id = trail[0].id;

    CatalogStore::delete_category(&pool, root_id).await.unwrap();

    for node in &trail {
        let err = CatalogStore::get_category(&pool, node.id).await.unwrap_err();
        assert!(matches!(err, ShopError::CategoryNotFound(_)));
    }

    let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphaned, 0);
}

#[tokio::test]
async fn has_available_items_reflects_the_subtree() {
    let pool = test_pool().await;
    let product = seed_product(&pool, &["Tea", "Green", "Sencha"], 500, 2).await;
    let trail = CatalogNavigator::get_breadcrumb(&pool, product.id).await.unwrap();
    let root_id = trail[0].id;

    assert!(StockIndex::has_available_items(&pool, root_id).await.unwrap());
    assert!(StockIndex::has_available_items(&pool, product.id).await.unwrap());

    ReservationEngine::reserve(&pool, product.id, 2).await.unwrap();

    assert!(!StockIndex::has_available_items(&pool, root_id).await.unwrap());
    assert!(!StockIndex::has_available_items(&pool, product.id).await.unwrap());
}

#[tokio::test]
async fn take_new_flags_drains_announcements() {
    let pool = test_pool().await;
    let first = seed_product(&pool, &["Tea"], 100, 2).await;
    let second = seed_product(&pool, &["Coffee"], 100, 1).await;

    let mut announced = CatalogStore::take_new_flags(&pool).await.unwrap();
    announced.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(announced, expected);

    assert!(CatalogStore::take_new_flags(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn restock_rejects_non_product_categories() {
    let pool = test_pool().await;
    let product = seed_product(&pool, &["Tea", "Green"], 100, 0).await;
    let tea_id = CatalogNavigator::get_breadcrumb(&pool, product.id).await.unwrap()[0].id;

    let err = CatalogStore::add_items(&pool, tea_id, &["x".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::NotAProduct(_)));
}

#[tokio::test]
async fn category_updates_are_scoped_by_id() {
    let pool = test_pool().await;
    let product = seed_product(&pool, &["Tea", "Green"], 100, 0).await;

    CatalogStore::update_price(&pool, product.id, 750).await.unwrap();
    CatalogStore::update_description(&pool, product.id, "fresh harvest").await.unwrap();
    CatalogStore::update_image(&pool, product.id, "img/green.png").await.unwrap();

    let updated = CatalogStore::get_category(&pool, product.id).await.unwrap();
    assert_eq!(updated.price_cents, Some(750));
    assert_eq!(updated.description.as_deref(), Some("fresh harvest"));
    assert_eq!(updated.image_ref.as_deref(), Some("img/green.png"));

    let err = CatalogStore::update_price(&pool, 9999, 100).await.unwrap_err();
    assert!(matches!(err, ShopError::CategoryNotFound(9999)));
}
