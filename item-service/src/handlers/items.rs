use crate::config::UpdateMode;
use crate::dtos::{ItemListParams, PartitionKeyQuery};
use crate::models::{update_partition_key, Item};
use crate::services::metrics::timed;
use crate::services::ListFilter;
use crate::startup::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use service_core::error::AppError;

type JsonObject = Result<Json<Map<String, Value>>, JsonRejection>;

pub async fn create_item(
    State(state): State<AppState>,
    payload: JsonObject,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let item = Item::from_draft(body)?;

    tracing::info!(item_id = %item.id, pk = %item.pk, "Creating item");

    let created = timed("create", state.store.create(item))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create item");
            AppError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn read_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PartitionKeyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(item_id) = path?;
    let pk = query?.0.required()?;

    let item = timed("read", state.store.read(&item_id, &pk)).await?;

    Ok(Json(item))
}

pub async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = query?;
    let filter = ListFilter {
        limit: params.page_size(state.config.api.max_page_size),
        offset: params.offset.unwrap_or(0),
        pk: params.pk.filter(|pk| !pk.is_empty()),
    };

    if filter.pk.is_none() {
        tracing::debug!(limit = filter.limit, offset = filter.offset, "Listing items across all partitions");
    }

    let items = timed("list", state.store.list(filter)).await?;

    Ok(Json(items))
}

pub async fn update_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PartitionKeyQuery>, QueryRejection>,
    payload: JsonObject,
) -> Result<impl IntoResponse, AppError> {
    let Path(item_id) = path?;
    let Query(query) = query?;
    let Json(body) = payload?;
    let pk = update_partition_key(query.pk.as_deref(), &body)?;

    let item = match state.config.api.update_mode {
        UpdateMode::Merge => {
            let existing = timed("read", state.store.read(&item_id, &pk)).await?;
            existing.merged(body)?
        }
        UpdateMode::Replace => Item::replacement(body, &item_id, &pk)?,
    };

    tracing::info!(
        item_id = %item_id,
        pk = %pk,
        mode = ?state.config.api.update_mode,
        "Updating item"
    );

    let updated = timed("upsert", state.store.upsert(item))
        .await
        .map_err(|e| {
            tracing::error!(item_id = %item_id, error = %e, "Failed to upsert item");
            AppError::from(e)
        })?;

    Ok(Json(updated))
}

pub async fn delete_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PartitionKeyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(item_id) = path?;
    let pk = query?.0.required()?;

    timed("delete", state.store.delete(&item_id, &pk)).await?;

    tracing::info!(item_id = %item_id, pk = %pk, "Deleted item");

    Ok(StatusCode::NO_CONTENT)
}
