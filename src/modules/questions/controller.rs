use std::collections::HashMap;

use anyhow::anyhow;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::middleware::auth::{RequireAdmin, RequireUser};
use crate::modules::auth::controller::ErrorResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::upload::{FormData, UploadedFile, parse_form};

use super::model::{CreateQuestionDto, QuestionChoice, QuestionWithChoices, UpdateQuestionDto};
use super::service::QuestionService;

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuestionFilter {
    /// Restrict results to one section.
    pub section_id: Option<Uuid>,
}

/// Question payloads arrive as a `data` JSON form field so the DTO and its
/// nested choices can travel next to the binary parts. Unknown enum tags
/// fail deserialization here and surface as a 400.
fn parse_data_field<T: DeserializeOwned>(form: &FormData) -> Result<T, AppError> {
    let raw = form.require_field("data")?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::bad_request(anyhow!("Invalid data field: {}", e)))
}

/// Pull `choice_file_0`, `choice_file_1`, ... into an index-keyed map.
fn collect_choice_files(form: &mut FormData) -> HashMap<usize, UploadedFile> {
    let indexed: Vec<(usize, String)> = form
        .files
        .keys()
        .filter_map(|name| {
            name.strip_prefix("choice_file_")
                .and_then(|i| i.parse::<usize>().ok())
                .map(|i| (i, name.clone()))
        })
        .collect();

    indexed
        .into_iter()
        .filter_map(|(i, name)| form.files.remove(&name).map(|file| (i, file)))
        .collect()
}

/// Create a question (multipart: `data` JSON plus optional `question_file`
/// and `choice_file_{i}` parts)
#[utoipa::path(
    post,
    path = "/api/questions",
    request_body(content = CreateQuestionDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Question created", body = QuestionWithChoices),
        (status = 404, description = "Section not found", body = ErrorResponse),
        (status = 400, description = "Answer rules violated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip_all)]
pub async fn create_question(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<QuestionWithChoices>), AppError> {
    let mut form = parse_form(multipart).await?;
    let dto: CreateQuestionDto = parse_data_field(&form)?;
    let choice_files = collect_choice_files(&mut form);
    let question_file = form.files.remove("question_file");

    let question = QuestionService::create_question(
        &state.db,
        state.media.as_ref(),
        dto,
        question_file,
        choice_files,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// List questions with their choices, optionally filtered by section
#[utoipa::path(
    get,
    path = "/api/questions",
    params(QuestionFilter),
    responses(
        (status = 200, description = "Questions", body = [QuestionWithChoices]),
        (status = 404, description = "Section not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip(state, _user))]
pub async fn get_questions(
    State(state): State<AppState>,
    _user: RequireUser,
    Query(filter): Query<QuestionFilter>,
) -> Result<Json<Vec<QuestionWithChoices>>, AppError> {
    let questions = QuestionService::get_questions(&state.db, filter.section_id).await?;
    Ok(Json(questions))
}

/// Fetch a single question with its choices
#[utoipa::path(
    get,
    path = "/api/questions/{id}",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "The question", body = QuestionWithChoices),
        (status = 404, description = "Question not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip(state, _user))]
pub async fn get_question_by_id(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionWithChoices>, AppError> {
    let question = QuestionService::get_question_by_id(&state.db, id).await?;
    Ok(Json(question))
}

/// List the choices of a question
#[utoipa::path(
    get,
    path = "/api/questions/{id}/choices",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "The choices", body = [QuestionChoice]),
        (status = 404, description = "Question not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip(state, _user))]
pub async fn get_choices(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QuestionChoice>>, AppError> {
    let choices = QuestionService::get_choices(&state.db, id).await?;
    Ok(Json(choices))
}

/// Update a question; supplied `choices` replace the full set
#[utoipa::path(
    put,
    path = "/api/questions/{id}",
    params(("id" = Uuid, Path, description = "Question ID")),
    request_body(content = UpdateQuestionDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated question", body = QuestionWithChoices),
        (status = 404, description = "Question or section not found", body = ErrorResponse),
        (status = 400, description = "Answer rules violated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip(state, _admin, multipart))]
pub async fn update_question(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<QuestionWithChoices>, AppError> {
    let mut form = parse_form(multipart).await?;
    let dto: UpdateQuestionDto = if form.fields.contains_key("data") {
        parse_data_field(&form)?
    } else {
        UpdateQuestionDto::default()
    };
    let choice_files = collect_choice_files(&mut form);
    let question_file = form.files.remove("question_file");

    let question = QuestionService::update_question(
        &state.db,
        state.media.as_ref(),
        id,
        dto,
        question_file,
        choice_files,
    )
    .await?;
    Ok(Json(question))
}

/// Delete a question, its choices, and their media files
#[utoipa::path(
    delete,
    path = "/api/questions/{id}",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 404, description = "Question not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Questions"
)]
#[instrument(skip(state, _admin))]
pub async fn delete_question(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    QuestionService::delete_question(&state.db, state.media.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
