//! HTTP request handlers.
//!
//! Each item route maps to one [`ItemStore`](crate::traits::ItemStore) operation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::{SET_COOKIE, WWW_AUTHENTICATE}, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{cleared_session_cookie, session_cookie, session_user, Credentials, SessionUser};
use crate::error::{AppError, ValidationError};
use crate::item::{validate_batch, NewItem, TodoItem};
use crate::state::AppState;

/// `POST /add/item` accepts the fields either directly, or wrapped into a `jsonObject` member
#[derive(Deserialize)]
#[serde(untagged)]
enum AddItemBody {
    Wrapped {
        #[serde(rename = "jsonObject")]
        json_object: NewItem,
    },
    Bare(NewItem),
}

#[derive(Deserialize)]
pub struct SearchParams {
    taskname: Option<String>,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ValidationError> {
    serde_json::from_slice(body).map_err(|err| {
        log::debug!("Malformed payload: {}", err);
        ValidationError::MalformedPayload
    })
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Connected to Backend server!" }))
}

pub async fn authenticate_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match Credentials::from_headers(&headers) {
        Some(creds) if state.users.authenticate(&creds) => {
            log::info!("user logging in: {}", creds.username);
            let cookie = session_cookie(&state.signer, &creds.username);
            (StatusCode::OK, [(SET_COOKIE, cookie)]).into_response()
        },
        _ => {
            let challenge = [(WWW_AUTHENTICATE, "Basic realm=\"todo\"")];
            (challenge, AppError::Unauthorized).into_response()
        },
    }
}

pub async fn upsert_user_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    let creds = Credentials::from_headers(&headers).ok_or(AppError::Unauthorized)?;
    let current_user = session_user(&headers, &state.signer);

    if state.users.upsert(&creds, current_user.as_deref()) == false {
        return Err(AppError::Unauthorized);
    }
    log::info!("user {} saved", creds.username);
    Ok(StatusCode::OK)
}

pub async fn logout_handler() -> impl IntoResponse {
    (StatusCode::OK, [(SET_COOKIE, cleared_session_cookie())])
}

pub async fn add_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let new_item = match parse_body::<AddItemBody>(&body)? {
        AddItemBody::Wrapped { json_object } => json_object,
        AddItemBody::Bare(item) => item,
    };
    let item = new_item.validate()?;
    let id = item.id().to_string();

    state.store.add(item).await?;
    log::info!("{} added item {}", user.0, id);
    Ok(StatusCode::OK)
}

pub async fn add_items_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let mut payload: Value = parse_body(&body)?;
    let todos = match payload.get_mut("todos").map(Value::take) {
        Some(Value::Array(todos)) if todos.is_empty() == false => todos,
        _ => return Err(ValidationError::EmptyBatch.into()),
    };

    let submitted = todos.len();
    let items = validate_batch(todos);
    let added_count = state.store.add_batch(items).await?;
    log::info!("{} added {} of {} submitted items", user.0, added_count, submitted);

    Ok(Json(json!({
        "message": "Todos added successfully",
        "addedCount": added_count,
    })))
}

pub async fn list_items_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TodoItem>>, AppError> {
    Ok(Json(state.store.list().await?))
}

pub async fn search_items_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let task = params.taskname.ok_or(ValidationError::MissingParameter("taskname"))?;
    Ok(Json(state.store.find_by_task(&task).await?))
}

pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.remove(&id).await?;
    log::info!("{} removed item {}", user.0, id);
    Ok(StatusCode::OK)
}

pub async fn complete_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.set_completed(&id).await?;
    log::info!("{} completed item {}", user.0, id);
    Ok(StatusCode::OK)
}
