//! Cart endpoints exercised through the full router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use partshop_integration_tests::{TestApp, cart_quantities, dec, money};

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_health_reports_connected_database() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "database": "connected" }));
}

#[tokio::test]
async fn test_products_and_categories() {
    let app = TestApp::new().await;

    let (status, products) = app.get("/api/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products.as_array().unwrap().len(), 3);

    let gpu = &app.products[1];
    let (status, product) = app.get(&format!("/api/products/{}", gpu.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["code"], "GPU-NV4070SUPR");
    assert_eq!(product["category"]["name"], "karta graficzna");

    let (status, in_category) = app
        .get(&format!("/api/products/category/{}", gpu.category_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(in_category.as_array().unwrap().len(), 1);

    let (status, categories) = app.get("/api/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        categories
            .as_array()
            .unwrap()
            .iter()
            .all(|c| c["productCount"] == 1)
    );
}

#[tokio::test]
async fn test_unknown_product_is_404() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/products/9999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("9999"));
}

// =============================================================================
// Cart reads and writes
// =============================================================================

#[tokio::test]
async fn test_missing_cart_reads_as_empty_items() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/cart/nobody").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "items": [] }));
}

#[tokio::test]
async fn test_add_item_creates_user_and_cart() {
    let app = TestApp::new().await;
    let ssd = &app.products[2];

    let (status, line) = app
        .post(
            "/api/cart/guest-1/items",
            &json!({ "productId": ssd.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 2);
    assert_eq!(line["product"]["code"], "SSD-SAM990P1T");

    app.add_to_cart("guest-1", ssd, 1).await;

    let (_, cart) = app.get("/api/cart/guest-1").await;
    assert_eq!(cart["userId"], "guest-1");
    assert_eq!(cart_quantities(&cart), [("SSD-SAM990P1T".to_owned(), 3)]);

    let (_, users) = app.get("/api/users/carts").await;
    let guest = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == "guest-1")
        .unwrap();
    assert_eq!(guest["name"], "Auto Generated User");
    assert_eq!(guest["cart"]["itemCount"], 1);
}

#[tokio::test]
async fn test_add_item_rejects_bad_input() {
    let app = TestApp::new().await;
    let cpu = &app.products[0];

    let (status, _) = app
        .post(
            "/api/cart/u1/items",
            &json!({ "productId": cpu.id, "quantity": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/cart/u1/items", &json!({ "productId": 4242, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post_raw("/api/cart/u1/items", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Nothing was written by any rejected request.
    let (_, cart) = app.get("/api/cart/u1").await;
    assert_eq!(cart, json!({ "items": [] }));
}

#[tokio::test]
async fn test_malformed_path_ids_are_json_400() {
    let app = TestApp::new().await;

    let (status, body) = app.delete("/api/cart/u1/items/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/products/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/products/category/99999999999").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_line_quantity_is_capped() {
    let app = TestApp::new().await;
    let cpu = &app.products[0];
    app.add_to_cart("u1", cpu, 9_999).await;

    let (status, body) = app
        .post("/api/cart/u1/items", &json!({ "productId": cpu.id, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .post(
            "/api/cart/u2/items",
            &json!({ "productId": cpu.id, "quantity": 10_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cart) = app.get("/api/cart/u1").await;
    assert_eq!(cart_quantities(&cart), [("CPU-R77800X3D".to_owned(), 9_999)]);
}

#[tokio::test]
async fn test_remove_item() {
    let app = TestApp::new().await;
    let (cpu, gpu) = (&app.products[0], &app.products[1]);
    app.add_to_cart("u1", cpu, 1).await;
    app.add_to_cart("u1", gpu, 1).await;

    let (status, body) = app.delete(&format!("/api/cart/u1/items/{}", cpu.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (_, cart) = app.get("/api/cart/u1").await;
    assert_eq!(cart_quantities(&cart), [("GPU-NV4070SUPR".to_owned(), 1)]);

    let (status, _) = app.delete(&format!("/api/cart/u1/items/{}", cpu.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_total_is_undiscounted() {
    let app = TestApp::new().await;
    app.add_to_cart("u1", &app.products[1], 1).await;
    app.add_to_cart("u1", &app.products[2], 3).await;

    let (status, body) = app.get("/api/cart/u1/total").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "u1");
    // 2899 + 3 * 19.99
    assert_eq!(money(&body["total"]), dec("2958.97"));

    let (_, empty) = app.get("/api/cart/nobody/total").await;
    assert_eq!(money(&empty["total"]), dec("0"));
}

// =============================================================================
// Cart transfer
// =============================================================================

#[tokio::test]
async fn test_transfer_merges_quantities_and_empties_source() {
    let app = TestApp::new().await;
    let (cpu, gpu, ssd) = (&app.products[0], &app.products[1], &app.products[2]);
    app.add_to_cart("guest", gpu, 1).await;
    app.add_to_cart("guest", ssd, 2).await;
    app.add_to_cart("member", ssd, 1).await;
    app.add_to_cart("member", cpu, 1).await;

    // Prime the member's cached view so the transfer must invalidate it.
    app.get("/api/cart/member").await;

    let (status, body) = app
        .post(
            "/api/cart/transfer",
            &json!({ "fromUserId": "guest", "toUserId": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "transferred");
    assert_eq!(body["linesMoved"], 2);
    assert_eq!(body["destination"]["userId"], "member");

    let (_, member) = app.get("/api/cart/member").await;
    assert_eq!(
        cart_quantities(&member),
        [
            ("CPU-R77800X3D".to_owned(), 1),
            ("GPU-NV4070SUPR".to_owned(), 1),
            ("SSD-SAM990P1T".to_owned(), 3),
        ]
    );

    let (_, guest) = app.get("/api/cart/guest").await;
    assert!(guest["id"].is_number(), "source cart is kept");
    assert!(guest["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_of_empty_cart_reports_nothing_to_do() {
    let app = TestApp::new().await;
    app.user("member").await;

    let (status, body) = app
        .post(
            "/api/cart/transfer",
            &json!({ "fromUserId": "nobody", "toUserId": "member" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["outcome"], "nothingToTransfer");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_transfer_rejections() {
    let app = TestApp::new().await;
    app.add_to_cart("guest", &app.products[0], 1).await;

    let (status, _) = app
        .post(
            "/api/cart/transfer",
            &json!({ "fromUserId": "guest", "toUserId": "guest" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/cart/transfer",
            &json!({ "fromUserId": "guest", "toUserId": "ghost" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/cart/transfer", &json!({ "fromUserId": "guest" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The source cart is untouched by every failed transfer.
    let (_, guest) = app.get("/api/cart/guest").await;
    assert_eq!(cart_quantities(&guest), [("CPU-R77800X3D".to_owned(), 1)]);
}

#[tokio::test]
async fn test_failed_transfer_changes_nothing() {
    let app = TestApp::new().await;
    app.add_to_cart("guest", &app.products[0], 2).await;
    app.add_to_cart("member", &app.products[1], 1).await;
    // expect, ensure cart, upsert, clear: fail on the clear.
    app.store.fail_on_intent(Some(3)).await;

    let (status, body) = app
        .post(
            "/api/cart/transfer",
            &json!({ "fromUserId": "guest", "toUserId": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    app.store.fail_on_intent(None).await;

    let (_, guest) = app.get("/api/cart/guest").await;
    let (_, member) = app.get("/api/cart/member").await;
    assert_eq!(cart_quantities(&guest), [("CPU-R77800X3D".to_owned(), 2)]);
    assert_eq!(cart_quantities(&member), [("GPU-NV4070SUPR".to_owned(), 1)]);
}
