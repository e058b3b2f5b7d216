use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A unit of study inside a level. Deleting the parent level cascades here.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Section {
    pub id: Uuid,
    pub level_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSectionDto {
    pub level_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSectionDto {
    pub level_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
}
