use anyhow::anyhow;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::{RequireAdmin, RequireUser};
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::upload::parse_form;
use crate::validator::format_errors;

use super::model::{CreateLevelDto, Level, UpdateLevelDto};
use super::service::LevelService;

/// Create a level (multipart: `name`, optional `description` and `image`)
#[utoipa::path(
    post,
    path = "/api/levels",
    request_body(content = CreateLevelDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Level created", body = Level),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 409, description = "Level name already in use", body = ErrorResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Levels"
)]
#[instrument(skip_all)]
pub async fn create_level(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Level>), AppError> {
    let mut form = parse_form(multipart).await?;

    let dto = CreateLevelDto {
        name: form.require_field("name")?,
        description: form.field("description"),
    };
    dto.validate()
        .map_err(|errors| AppError::bad_request(anyhow!("{}", format_errors(&errors))))?;

    let image = form.files.remove("image");
    let level = LevelService::create_level(&state.db, state.media.as_ref(), dto, image).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

/// List all levels
#[utoipa::path(
    get,
    path = "/api/levels",
    responses(
        (status = 200, description = "All levels", body = [Level]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Levels"
)]
#[instrument(skip_all)]
pub async fn get_levels(
    State(state): State<AppState>,
    _user: RequireUser,
) -> Result<Json<Vec<Level>>, AppError> {
    let levels = LevelService::get_levels(&state.db).await?;
    Ok(Json(levels))
}

/// Fetch a single level
#[utoipa::path(
    get,
    path = "/api/levels/{id}",
    params(("id" = Uuid, Path, description = "Level ID")),
    responses(
        (status = 200, description = "The level", body = Level),
        (status = 404, description = "Level not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Levels"
)]
#[instrument(skip(state, _user))]
pub async fn get_level_by_id(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Level>, AppError> {
    let level = LevelService::get_level_by_id(&state.db, id).await?;
    Ok(Json(level))
}

/// Update a level; a new `image` replaces and deletes the old file
#[utoipa::path(
    put,
    path = "/api/levels/{id}",
    params(("id" = Uuid, Path, description = "Level ID")),
    request_body(content = UpdateLevelDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated level", body = Level),
        (status = 404, description = "Level not found", body = ErrorResponse),
        (status = 409, description = "Level name already in use", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Levels"
)]
#[instrument(skip(state, _admin, multipart))]
pub async fn update_level(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Level>, AppError> {
    let mut form = parse_form(multipart).await?;

    let dto = UpdateLevelDto {
        name: form.field("name"),
        description: form.field("description"),
    };
    dto.validate()
        .map_err(|errors| AppError::bad_request(anyhow!("{}", format_errors(&errors))))?;

    let image = form.files.remove("image");
    let level = LevelService::update_level(&state.db, state.media.as_ref(), id, dto, image).await?;
    Ok(Json(level))
}

/// Delete a level, its sections and questions, and all their media files
#[utoipa::path(
    delete,
    path = "/api/levels/{id}",
    params(("id" = Uuid, Path, description = "Level ID")),
    responses(
        (status = 204, description = "Level deleted"),
        (status = 404, description = "Level not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Levels"
)]
#[instrument(skip(state, _admin))]
pub async fn delete_level(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    LevelService::delete_level(&state.db, state.media.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
