//! Shared test harness: spawns the real router on a random port against the
//! in-memory store.

#![allow(dead_code)]

use billing_service::config::{BillingConfig, DatabaseConfig};
use billing_service::services::MemoryStore;
use billing_service::startup::Application;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = BillingConfig {
            common: CoreConfig { port: 0 },
            database: DatabaseConfig {
                // unused: tests run on the in-memory store
                url: "postgres://localhost:5432/unused".to_string(),
                max_connections: 1,
                min_connections: 1,
            },
            public_base_url: "http://billing.test".to_string(),
        };

        let store = Arc::new(MemoryStore::new());
        let app = Application::build_with_store(config, store.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("http://127.0.0.1:{port}/health");
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address: format!("http://127.0.0.1:{port}"),
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path))
    }
}

/// Attach a staff/admin identity to a request.
pub fn as_role(rb: reqwest::RequestBuilder, role: &str) -> reqwest::RequestBuilder {
    rb.header("x-user-id", Uuid::new_v4().to_string())
        .header("x-role", role)
}

/// Attach a `user`-role identity bound to a customer.
pub fn as_customer_user(rb: reqwest::RequestBuilder, customer_id: &str) -> reqwest::RequestBuilder {
    rb.header("x-user-id", Uuid::new_v4().to_string())
        .header("x-role", "user")
        .header("x-customer-id", customer_id)
}

/// A well-formed single-line invoice request body.
pub fn invoice_body(customer: &str, plate: &str) -> serde_json::Value {
    serde_json::json!({
        "customer_name": customer,
        "vehicle_number": plate,
        "item_names": ["Blue Metal 20mm"],
        "quantities": [2],
        "rates": [3000]
    })
}
