//! Settings lifecycle and catalog endpoints.

mod common;

use common::{as_role, invoice_body, TestApp};
use rust_decimal::Decimal;
use std::str::FromStr;

#[tokio::test]
async fn settings_are_created_lazily_with_default_rates() {
    let app = TestApp::spawn().await;

    let settings: serde_json::Value = as_role(app.get("/settings"), "admin")
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    let cgst = Decimal::from_str(settings["cgst_percent"].as_str().expect("string")).unwrap();
    assert_eq!(cgst, Decimal::from_str("2.5").unwrap());
    assert_eq!(settings["sms"]["auto_send"], false);
}

#[tokio::test]
async fn non_numeric_tax_rate_is_rejected() {
    let app = TestApp::spawn().await;

    let response = as_role(app.put("/settings"), "admin")
        .json(&serde_json::json!({ "cgst_percent": "abc" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn out_of_range_tax_rate_is_rejected() {
    let app = TestApp::spawn().await;

    let response = as_role(app.put("/settings"), "admin")
        .json(&serde_json::json!({ "sgst_percent": 150 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn updated_rates_apply_to_the_next_invoice() {
    let app = TestApp::spawn().await;

    let response = as_role(app.put("/settings"), "admin")
        .json(&serde_json::json!({ "cgst_percent": 9, "sgst_percent": 9 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let response = as_role(app.post("/invoices"), "staff")
        .json(&invoice_body("Murugan Traders", "TN32AX3344"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
    let issued: serde_json::Value = response.json().await.expect("json");

    let detail: serde_json::Value = as_role(
        app.get(&format!("/invoices/{}", issued["invoice_id"].as_str().unwrap())),
        "admin",
    )
    .send()
    .await
    .expect("request")
    .json()
    .await
    .expect("json");

    let cgst = Decimal::from_str(detail["invoice"]["cgst_amount"].as_str().unwrap()).unwrap();
    assert_eq!(cgst, Decimal::from_str("540.00").unwrap());
}

#[tokio::test]
async fn suggested_rate_averages_recent_billed_lines() {
    let app = TestApp::spawn().await;

    for rate in [3000, 3100, 3200, 9999] {
        let body = serde_json::json!({
            "customer_name": "Murugan Traders",
            "vehicle_number": "TN32AX3344",
            "item_names": ["M Sand"],
            "quantities": [1],
            "rates": [rate]
        });
        let response = as_role(app.post("/invoices"), "staff")
            .json(&body)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), 201);
    }

    let suggestion: serde_json::Value = as_role(app.get("/items/M Sand/suggested-rate"), "staff")
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    // last three rates: 3100, 3200, 9999 -> 5433.00
    let rate = Decimal::from_str(suggestion["rate"].as_str().expect("string")).unwrap();
    assert_eq!(rate, Decimal::from_str("5433.00").unwrap());
}

#[tokio::test]
async fn suggested_rate_for_never_billed_item_is_not_found() {
    let app = TestApp::spawn().await;

    let response = as_role(app.get("/items/Gravel/suggested-rate"), "staff")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn catalog_rate_changes_never_alter_existing_lines() {
    let app = TestApp::spawn().await;

    // admin seeds the catalog entry
    let response = as_role(app.put("/items"), "admin")
        .json(&serde_json::json!({ "name": "Blue Metal 20mm", "rate": 3000 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 204);

    let response = as_role(app.post("/invoices"), "staff")
        .json(&invoice_body("Murugan Traders", "TN32AX3344"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
    let issued: serde_json::Value = response.json().await.expect("json");

    // catalog rate moves afterwards
    let response = as_role(app.put("/items"), "admin")
        .json(&serde_json::json!({ "name": "Blue Metal 20mm", "rate": 5000 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 204);

    let detail: serde_json::Value = as_role(
        app.get(&format!("/invoices/{}", issued["invoice_id"].as_str().unwrap())),
        "admin",
    )
    .send()
    .await
    .expect("request")
    .json()
    .await
    .expect("json");

    let rate = Decimal::from_str(detail["lines"][0]["rate"].as_str().unwrap()).unwrap();
    assert_eq!(rate, Decimal::from_str("3000").unwrap());
}
