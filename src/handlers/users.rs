//! Customer management HTTP handlers.
//!
//! - GET /users - List users
//! - POST /users - Create user
//! - GET /users/{id} - Get user
//! - PUT /users/{id} - Update user names
//! - DELETE /users/{id} - Delete a user without accounts

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    models::user::{User, UserRequest},
    state::AppState,
};

/// List all users, newest first.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state
        .users
        .all_users()
        .await
        .map_err(AppError::from_user_store)?;
    Ok(Json(users))
}

/// Create a new user.
///
/// # Request Body
///
/// ```json
/// {
///   "first_name": "Ada",
///   "last_name": "Lovelace"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created user
/// - **Error (400)**: Blank name
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<UserRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let user = state
        .users
        .insert_user(&request.first_name, &request.last_name)
        .await
        .map_err(AppError::from_user_store)?;
    tracing::info!(user_id = user.id, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get_user(user_id)
        .await
        .map_err(AppError::from_user_store)?;
    Ok(Json(user))
}

/// Replace a user's names.
pub async fn update_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
    AppJson(request): AppJson<UserRequest>,
) -> Result<Json<User>, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let user = state
        .users
        .update_user(user_id, &request.first_name, &request.last_name)
        .await
        .map_err(AppError::from_user_store)?;
    Ok(Json(user))
}

/// Delete a user.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: User not found
/// - **Error (409)**: User still owns accounts
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state
        .users
        .delete_user(user_id)
        .await
        .map_err(AppError::from_user_store)?;
    tracing::info!(user_id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}
