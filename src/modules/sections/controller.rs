use anyhow::anyhow;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::{RequireAdmin, RequireUser};
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::upload::parse_form;
use crate::validator::format_errors;

use super::model::{CreateSectionDto, Section, UpdateSectionDto};
use super::service::SectionService;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SectionFilter {
    /// Restrict results to one level.
    pub level_id: Option<Uuid>,
}

fn parse_uuid_field(form_value: String, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(&form_value)
        .map_err(|_| AppError::bad_request(anyhow!("{} must be a valid UUID", field)))
}

/// Create a section (multipart: `level_id`, `name`, optional `description` and `image`)
#[utoipa::path(
    post,
    path = "/api/sections",
    request_body(content = CreateSectionDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Section created", body = Section),
        (status = 404, description = "Level not found", body = ErrorResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
#[instrument(skip_all)]
pub async fn create_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Section>), AppError> {
    let mut form = parse_form(multipart).await?;

    let dto = CreateSectionDto {
        level_id: parse_uuid_field(form.require_field("level_id")?, "level_id")?,
        name: form.require_field("name")?,
        description: form.field("description"),
    };
    dto.validate()
        .map_err(|errors| AppError::bad_request(anyhow!("{}", format_errors(&errors))))?;

    let image = form.files.remove("image");
    let section =
        SectionService::create_section(&state.db, state.media.as_ref(), dto, image).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

/// List sections, optionally filtered by level
#[utoipa::path(
    get,
    path = "/api/sections",
    params(SectionFilter),
    responses(
        (status = 200, description = "Sections", body = [Section]),
        (status = 404, description = "Level not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
#[instrument(skip(state, _user))]
pub async fn get_sections(
    State(state): State<AppState>,
    _user: RequireUser,
    Query(filter): Query<SectionFilter>,
) -> Result<Json<Vec<Section>>, AppError> {
    let sections = SectionService::get_sections(&state.db, filter.level_id).await?;
    Ok(Json(sections))
}

/// Fetch a single section
#[utoipa::path(
    get,
    path = "/api/sections/{id}",
    params(("id" = Uuid, Path, description = "Section ID")),
    responses(
        (status = 200, description = "The section", body = Section),
        (status = 404, description = "Section not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
#[instrument(skip(state, _user))]
pub async fn get_section_by_id(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Section>, AppError> {
    let section = SectionService::get_section_by_id(&state.db, id).await?;
    Ok(Json(section))
}

/// Update a section; a new `image` replaces and deletes the old file
#[utoipa::path(
    put,
    path = "/api/sections/{id}",
    params(("id" = Uuid, Path, description = "Section ID")),
    request_body(content = UpdateSectionDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated section", body = Section),
        (status = 404, description = "Section or level not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
#[instrument(skip(state, _admin, multipart))]
pub async fn update_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Section>, AppError> {
    let mut form = parse_form(multipart).await?;

    let level_id = match form.field("level_id") {
        Some(value) => Some(parse_uuid_field(value, "level_id")?),
        None => None,
    };
    let dto = UpdateSectionDto {
        level_id,
        name: form.field("name"),
        description: form.field("description"),
    };
    dto.validate()
        .map_err(|errors| AppError::bad_request(anyhow!("{}", format_errors(&errors))))?;

    let image = form.files.remove("image");
    let section =
        SectionService::update_section(&state.db, state.media.as_ref(), id, dto, image).await?;
    Ok(Json(section))
}

/// Delete a section, its questions, and their media files
#[utoipa::path(
    delete,
    path = "/api/sections/{id}",
    params(("id" = Uuid, Path, description = "Section ID")),
    responses(
        (status = 204, description = "Section deleted"),
        (status = 404, description = "Section not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
#[instrument(skip(state, _admin))]
pub async fn delete_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    SectionService::delete_section(&state.db, state.media.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
