use super::store::{ItemStore, ListFilter, StoreError};
use crate::config::StoreConfig;
use crate::models::Item;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneOptions, FindOptions, IndexOptions, ReplaceOptions, ServerAddress,
    },
    Client as MongoClient, Collection, Database, IndexModel,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;
/// Request rate too large on the managed store.
const THROTTLED: i32 = 16500;

/// Item store backed by the managed document database's MongoDB API.
#[derive(Clone)]
pub struct MongoItemStore {
    db: Database,
    items: Collection<Document>,
}

impl MongoItemStore {
    /// Opens the client with key-based credentials and provisions the
    /// database, collection and `(pk, id)` index.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let (endpoint, key) = match (&config.endpoint, &config.key) {
            (Some(endpoint), Some(key)) => (endpoint, key),
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "COSMOS_ENDPOINT and COSMOS_KEY must be set in environment"
                )))
            }
        };

        let mut options = ClientOptions::parse(endpoint).await.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid COSMOS_ENDPOINT: {}", e))
        })?;
        let account = account_name(&options);
        let mut credential = options.credential.take().unwrap_or_default();
        if credential.username.is_none() {
            credential.username = account;
        }
        credential.password = Some(key.expose_secret().clone());
        options.credential = Some(credential);

        Self::open(options, &config.database, &config.container, config.throughput).await
    }

    /// Opens the client as given by `options` and makes sure the database,
    /// collection and `(pk, id)` index exist. Safe to run against an already
    /// provisioned store.
    pub async fn open(
        mut options: ClientOptions,
        database: &str,
        container: &str,
        throughput: Option<u32>,
    ) -> Result<Self, AppError> {
        tracing::info!(database = %database, container = %container, "Connecting to document store");

        options.app_name = Some("item-service".to_string());
        let client = MongoClient::with_options(options)
            .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
        let db = client.database(database);
        let items = db.collection::<Document>(container);

        let store = Self { db, items };
        store.ensure_collection(container, throughput).await?;
        store.ensure_indexes().await?;

        tracing::info!(database = %database, container = %container, "Document store ready");
        Ok(store)
    }

    async fn ensure_collection(&self, name: &str, throughput: Option<u32>) -> Result<(), AppError> {
        let existing = self
            .db
            .list_collection_names(doc! { "name": name })
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
        if !existing.is_empty() {
            tracing::info!(container = %name, "Collection already exists");
            return Ok(());
        }

        let created = match throughput {
            Some(throughput) => self
                .db
                .run_command(
                    doc! {
                        "customAction": "CreateCollection",
                        "collection": name,
                        "shardKey": "pk",
                        "offerThroughput": i64::from(throughput),
                    },
                    None,
                )
                .await
                .map(|_| ()),
            None => self.db.create_collection(name, None).await,
        };

        match created {
            Ok(()) => {
                tracing::info!(container = %name, throughput = ?throughput, "Created collection");
                Ok(())
            }
            // Another instance won the race.
            Err(e) if command_code(&e) == Some(NAMESPACE_EXISTS) => Ok(()),
            Err(e) => {
                tracing::error!(container = %name, error = %e, "Failed to create collection");
                Err(AppError::DatabaseError(anyhow::Error::new(e)))
            }
        }
    }

    async fn ensure_indexes(&self) -> Result<(), AppError> {
        let address_index = IndexModel::builder()
            .keys(doc! { "pk": 1, "id": 1 })
            .options(
                IndexOptions::builder()
                    .name("pk_id_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.items
            .create_index(address_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create (pk, id) index: {}", e);
                AppError::DatabaseError(anyhow::Error::new(e))
            })?;
        tracing::info!("Created index on items.(pk, id)");
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ItemStore for MongoItemStore {
    async fn create(&self, item: Item) -> Result<Item, StoreError> {
        let document = to_document(&item)?;
        match self.items.insert_one(document, None).await {
            Ok(_) => Ok(item),
            Err(e) if write_code(&e) == Some(DUPLICATE_KEY) => Err(StoreError::Conflict {
                id: item.id,
                pk: item.pk,
            }),
            Err(e) => Err(classify(e)),
        }
    }

    async fn read(&self, id: &str, pk: &str) -> Result<Item, StoreError> {
        let options = FindOneOptions::builder()
            .projection(doc! { "_id": 0 })
            .build();
        self.items
            .find_one(doc! { "pk": pk, "id": id }, options)
            .await
            .map_err(classify)?
            .map(from_document)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
                pk: pk.to_string(),
            })
    }

    async fn upsert(&self, item: Item) -> Result<Item, StoreError> {
        let document = to_document(&item)?;
        let options = ReplaceOptions::builder().upsert(true).build();
        self.items
            .replace_one(doc! { "pk": &item.pk, "id": &item.id }, document, options)
            .await
            .map_err(classify)?;
        Ok(item)
    }

    async fn delete(&self, id: &str, pk: &str) -> Result<(), StoreError> {
        let result = self
            .items
            .delete_one(doc! { "pk": pk, "id": id }, None)
            .await
            .map_err(classify)?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound {
                id: id.to_string(),
                pk: pk.to_string(),
            });
        }
        Ok(())
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Item>, StoreError> {
        let query = match &filter.pk {
            Some(pk) => doc! { "pk": pk },
            None => doc! {},
        };
        let options = FindOptions::builder()
            .projection(doc! { "_id": 0 })
            .sort(doc! { "pk": 1, "id": 1 })
            .skip(filter.offset)
            .limit(i64::from(filter.limit))
            .batch_size(filter.limit)
            .build();

        let mut cursor = self.items.find(query, options).await.map_err(classify)?;
        let mut items = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(classify)? {
            items.push(from_document(document)?);
        }
        Ok(items)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("Document store health check failed: {}", e);
                classify(e)
            })?;
        Ok(())
    }
}

/// Username for key-based auth: the account name is the first label of the
/// endpoint host (`<account>.mongo.cosmos.azure.com`).
fn account_name(options: &ClientOptions) -> Option<String> {
    match options.hosts.first() {
        Some(ServerAddress::Tcp { host, .. }) => host
            .split('.')
            .next()
            .filter(|label| !label.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn to_document(item: &Item) -> Result<Document, StoreError> {
    bson::to_document(item)
        .map_err(|e| StoreError::Invalid(anyhow::anyhow!("Failed to encode item: {}", e)))
}

fn from_document(mut document: Document) -> Result<Item, StoreError> {
    document.remove("_id");
    let value = Bson::Document(document).into_relaxed_extjson();
    serde_json::from_value(value)
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("Stored item is malformed: {}", e)))
}

fn write_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        ErrorKind::Command(e) => Some(e.code),
        _ => None,
    }
}

fn command_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => Some(e.code),
        _ => None,
    }
}

fn classify(err: MongoError) -> StoreError {
    let unavailable = matches!(
        err.kind.as_ref(),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    ) || write_code(&err) == Some(THROTTLED);

    if unavailable {
        StoreError::Unavailable(anyhow::Error::new(err))
    } else {
        StoreError::Backend(anyhow::Error::new(err))
    }
}
