use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// What the learner is shown. For `image`/`audio` the content column holds
/// a media reference instead of display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Image,
    Audio,
}

/// How the answer is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "answer_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    MultipleChoice,
    FillInBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "choice_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChoiceType {
    Text,
    Image,
    Audio,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Question {
    pub id: Uuid,
    pub section_id: Uuid,
    pub question_type: QuestionType,
    pub question_content: Option<String>,
    pub answer_type: AnswerType,
    pub correct_answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct QuestionChoice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub choice_type: ChoiceType,
    pub content: Option<String>,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<QuestionChoice>,
}

/// One proposed choice inside the question `data` payload. For image/audio
/// choices the file rides alongside as `choice_file_{index}`; `content`
/// then carries an existing reference or nothing.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChoiceDto {
    pub choice_type: ChoiceType,
    pub content: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionDto {
    pub section_id: Uuid,
    pub question_type: QuestionType,
    pub question_content: Option<String>,
    pub answer_type: AnswerType,
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceDto>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateQuestionDto {
    pub section_id: Option<Uuid>,
    pub question_type: Option<QuestionType>,
    pub question_content: Option<String>,
    pub answer_type: Option<AnswerType>,
    pub correct_answer: Option<String>,
    /// When present, replaces the full choice set.
    pub choices: Option<Vec<ChoiceDto>>,
}
