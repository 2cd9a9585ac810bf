#![allow(dead_code)]

use item_service::config::{ApiConfig, ItemConfig, StoreConfig, UpdateMode};
use item_service::services::{InMemoryItemStore, ItemStore, ListFilter, MongoItemStore};
use item_service::startup::Application;
use mongodb::options::ClientOptions;
use reqwest::{Client, Response};
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use uuid::Uuid;

pub const MONGODB_URI: &str = "mongodb://localhost:27017";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<dyn ItemStore>,
    pub client: Client,
    /// Set when the app runs against MongoDB; dropped by `cleanup`.
    pub mongo: Option<MongoItemStore>,
}

pub fn test_config(api: ApiConfig) -> ItemConfig {
    ItemConfig {
        common: CoreConfig {
            port: 0, // Random port for testing
            ..CoreConfig::default()
        },
        store: StoreConfig::memory(),
        api,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(ApiConfig::default()).await
    }

    pub async fn spawn_with_update_mode(update_mode: UpdateMode) -> Self {
        Self::spawn_with(ApiConfig {
            update_mode,
            ..ApiConfig::default()
        })
        .await
    }

    pub async fn spawn_with(api: ApiConfig) -> Self {
        Self::spawn_with_store(api, Arc::new(InMemoryItemStore::new())).await
    }

    /// Runs against a throwaway database on a local MongoDB.
    pub async fn spawn_mongo() -> Self {
        Self::spawn_mongo_with(ApiConfig::default()).await
    }

    pub async fn spawn_mongo_with(api: ApiConfig) -> Self {
        let db_name = format!("item_test_{}", Uuid::new_v4().simple());
        let options = ClientOptions::parse(MONGODB_URI)
            .await
            .expect("Failed to parse MongoDB URI");
        // No throughput: a plain MongoDB has no CreateCollection extension.
        let mongo = MongoItemStore::open(options, &db_name, "items", None)
            .await
            .expect("Failed to connect to MongoDB");

        let mut app = Self::spawn_with_store(api, Arc::new(mongo.clone())).await;
        app.mongo = Some(mongo);
        app
    }

    pub async fn spawn_with_store(api: ApiConfig, store: Arc<dyn ItemStore>) -> Self {
        let app = Application::build_with_store(test_config(api), store.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
            mongo: None,
        }
    }

    /// Number of items in the backing store, across all partitions.
    pub async fn item_count(&self) -> usize {
        self.store
            .list(ListFilter {
                pk: None,
                limit: 1000,
                offset: 0,
            })
            .await
            .expect("Failed to list items")
            .len()
    }

    /// Drops the test database when running against MongoDB.
    pub async fn cleanup(&self) {
        if let Some(mongo) = &self.mongo {
            let _ = mongo.database().drop(None).await;
        }
    }

    pub fn items_url(&self) -> String {
        format!("{}/items", self.address)
    }

    pub fn item_url(&self, id: &str, pk: &str) -> String {
        format!("{}/items/{}?pk={}", self.address, id, pk)
    }

    pub async fn create_item(&self, body: &Value) -> Response {
        self.client
            .post(self.items_url())
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_item(&self, id: &str, pk: &str) -> Response {
        self.client
            .get(self.item_url(id, pk))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put_item(&self, id: &str, pk: &str, body: &Value) -> Response {
        self.client
            .put(self.item_url(id, pk))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete_item(&self, id: &str, pk: &str) -> Response {
        self.client
            .delete(self.item_url(id, pk))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn list_items(&self, query: &str) -> Response {
        self.client
            .get(format!("{}{}", self.items_url(), query))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
