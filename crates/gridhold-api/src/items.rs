use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use gridhold_types::api::{AckResponse, AddItemRequest, Claims, ItemResponse, ItemsResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const MAX_ITEM_NAME: usize = 64;

pub async fn list_items(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let id = claims.sub.to_string();
    let items = run_db(&state, move |db| db.list_items(&id)).await?;
    Ok(Json(ItemsResponse { items }))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_ITEM_NAME {
        return Err(ApiError::validation("Item name must be 1-64 characters"));
    }
    if req.quantity < 0 {
        return Err(ApiError::validation("Quantity cannot be negative"));
    }

    let id = claims.sub.to_string();
    let item = run_db(&state, move |db| db.add_item(&id, &name, req.quantity)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            success: true,
            item,
        }),
    ))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(item_id): Path<i64>,
) -> Result<Json<AckResponse>, ApiError> {
    let id = claims.sub.to_string();
    if !run_db(&state, move |db| db.delete_item(&id, item_id)).await? {
        return Err(ApiError::NotFound(format!("Item {} not found", item_id)));
    }

    Ok(Json(AckResponse {
        success: true,
        message: "Item deleted".into(),
    }))
}
