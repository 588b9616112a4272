//! Invoice issuance integration tests.

mod common;

use common::{as_role, invoice_body, TestApp};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string"))
        .expect("valid decimal")
}

#[tokio::test]
async fn create_invoice_computes_totals_and_allocates_number() {
    let app = TestApp::spawn().await;

    let response = as_role(app.post("/invoices"), "staff")
        .json(&invoice_body("Murugan Traders", "TN32AX3344"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);

    let issued: serde_json::Value = response.json().await.expect("json");
    assert_eq!(issued["bill_no"], "INV-0001");

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

    let invoice = &detail["invoice"];
    assert_eq!(dec(&invoice["subtotal"]), Decimal::from_str("6000").unwrap());
    assert_eq!(dec(&invoice["cgst_amount"]), Decimal::from_str("150.00").unwrap());
    assert_eq!(dec(&invoice["sgst_amount"]), Decimal::from_str("150.00").unwrap());
    assert_eq!(dec(&invoice["grand_total"]), Decimal::from_str("6300.00").unwrap());

    // subtotal reconciles with the line amounts
    let lines = detail["lines"].as_array().expect("lines");
    let line_sum: Decimal = lines.iter().map(|l| dec(&l["amount"])).sum();
    assert_eq!(line_sum, dec(&invoice["subtotal"]));
}

#[tokio::test]
async fn invalid_plate_is_rejected_with_no_side_effects() {
    let app = TestApp::spawn().await;

    let response = as_role(app.post("/invoices"), "staff")
        .json(&invoice_body("Murugan Traders", "TN32A334"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);

    assert_eq!(app.store.row_counts().await, (0, 0, 0, 0, 0));
}

#[tokio::test]
async fn lowercase_plate_is_normalized_before_storage() {
    let app = TestApp::spawn().await;

    let response = as_role(app.post("/invoices"), "staff")
        .json(&invoice_body("Murugan Traders", "tn32ax3344"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
    let issued: serde_json::Value = response.json().await.expect("json");

    let document: serde_json::Value = as_role(
        app.get(&format!(
            "/invoices/{}/document",
            issued["invoice_id"].as_str().unwrap()
        )),
        "admin",
    )
    .send()
    .await
    .expect("request")
    .json()
    .await
    .expect("json");

    assert_eq!(document["vehicle"]["plate"], "TN32AX3344");
}

#[tokio::test]
async fn malformed_line_rows_are_skipped() {
    let app = TestApp::spawn().await;

    let body = serde_json::json!({
        "customer_name": "Murugan Traders",
        "vehicle_number": "TN32AX3344",
        "item_names": ["Blue Metal 20mm", "", "M Sand"],
        "quantities": [2, 1, "three"],
        "rates": [3000, 100, 250]
    });

    let response = as_role(app.post("/invoices"), "staff")
        .json(&body)
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

    let lines = detail["lines"].as_array().expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["item_name"], "Blue Metal 20mm");
}

#[tokio::test]
async fn all_lines_malformed_rejects_the_whole_request() {
    let app = TestApp::spawn().await;

    let body = serde_json::json!({
        "customer_name": "Murugan Traders",
        "vehicle_number": "TN32AX3344",
        "item_names": ["", "M Sand"],
        "quantities": [2, "x"],
        "rates": [3000, 250]
    });

    let response = as_role(app.post("/invoices"), "staff")
        .json(&body)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);

    assert_eq!(app.store.row_counts().await, (0, 0, 0, 0, 0));
}

#[tokio::test]
async fn waybill_with_empty_driver_fails_with_zero_side_effects() {
    let app = TestApp::spawn().await;

    let mut body = invoice_body("Murugan Traders", "TN32AX3344");
    body["waybill"] = serde_json::json!({
        "driver_name": "  ",
        "material_type": "Blue Metal"
    });

    let response = as_role(app.post("/invoices"), "staff")
        .json(&body)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);

    assert_eq!(app.store.row_counts().await, (0, 0, 0, 0, 0));
}

#[tokio::test]
async fn waybill_defaults_unloading_to_two_hours_after_loading() {
    let app = TestApp::spawn().await;

    let mut body = invoice_body("Murugan Traders", "TN32AX3344");
    body["waybill"] = serde_json::json!({
        "driver_name": "Kumar",
        "material_type": "Blue Metal",
        "loading_at": "2026-08-06T08:00:00Z"
    });

    let response = as_role(app.post("/invoices"), "staff")
        .json(&body)
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

    let waybill = &detail["waybill"];
    assert_eq!(waybill["driver_name"], "Kumar");
    assert_eq!(waybill["loading_at"], "2026-08-06T08:00:00Z");
    assert_eq!(waybill["unloading_at"], "2026-08-06T10:00:00Z");
}

#[tokio::test]
async fn customer_fields_merge_first_write_wins() {
    let app = TestApp::spawn().await;

    let mut first = invoice_body("Murugan Traders", "TN32AX3344");
    first["customer_phone"] = serde_json::json!("9788388823");
    let response = as_role(app.post("/invoices"), "staff")
        .json(&first)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);

    let mut second = invoice_body("Murugan Traders", "TN32AX3344");
    second["customer_phone"] = serde_json::json!("1112223334");
    let response = as_role(app.post("/invoices"), "staff")
        .json(&second)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
    let issued: serde_json::Value = response.json().await.expect("json");

    let document: serde_json::Value = as_role(
        app.get(&format!(
            "/invoices/{}/document",
            issued["invoice_id"].as_str().unwrap()
        )),
        "admin",
    )
    .send()
    .await
    .expect("request")
    .json()
    .await
    .expect("json");

    // one customer row, and the first phone value stuck
    assert_eq!(app.store.row_counts().await.0, 1);
    assert_eq!(document["customer"]["phone"], "9788388823");
}

#[tokio::test]
async fn round_off_flows_into_grand_total() {
    let app = TestApp::spawn().await;

    let mut body = invoice_body("Murugan Traders", "TN32AX3344");
    body["round_off"] = serde_json::json!(-0.5);

    let response = as_role(app.post("/invoices"), "staff")
        .json(&body)
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

    assert_eq!(
        dec(&detail["invoice"]["grand_total"]),
        Decimal::from_str("6299.50").unwrap()
    );
}
