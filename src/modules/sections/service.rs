use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{MediaStore, delete_refs};
use crate::utils::errors::AppError;
use crate::utils::upload::UploadedFile;

use super::model::{CreateSectionDto, Section, UpdateSectionDto};

const SECTION_COLUMNS: &str = "id, level_id, name, description, image, created_at, updated_at";

pub struct SectionService;

impl SectionService {
    fn map_level_fk(e: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_foreign_key_violation()
        {
            return AppError::not_found(anyhow::anyhow!("Level not found"));
        }
        AppError::from(e)
    }

    #[instrument(skip(db, media, image))]
    pub async fn create_section(
        db: &PgPool,
        media: &dyn MediaStore,
        dto: CreateSectionDto,
        image: Option<UploadedFile>,
    ) -> Result<Section, AppError> {
        let image_ref = match &image {
            Some(file) => Some(
                media
                    .save("sections", &file.filename, &file.bytes)
                    .await
                    .map_err(AppError::storage)?,
            ),
            None => None,
        };

        let result = sqlx::query_as::<_, Section>(&format!(
            "INSERT INTO sections (level_id, name, description, image)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            SECTION_COLUMNS
        ))
        .bind(dto.level_id)
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(&image_ref)
        .fetch_one(db)
        .await
        .map_err(Self::map_level_fk);

        match result {
            Ok(section) => Ok(section),
            Err(e) => {
                if let Some(reference) = image_ref {
                    delete_refs(media, [reference]).await;
                }
                Err(e)
            }
        }
    }

    /// List sections, optionally scoped to a level. An unknown level is a
    /// 404; a known level with no sections is an empty list.
    #[instrument(skip(db))]
    pub async fn get_sections(
        db: &PgPool,
        level_id: Option<Uuid>,
    ) -> Result<Vec<Section>, AppError> {
        if let Some(level_id) = level_id {
            let level_exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM levels WHERE id = $1)")
                    .bind(level_id)
                    .fetch_one(db)
                    .await?;
            if !level_exists {
                return Err(AppError::not_found(anyhow::anyhow!("Level not found")));
            }

            let sections = sqlx::query_as::<_, Section>(&format!(
                "SELECT {} FROM sections WHERE level_id = $1 ORDER BY created_at",
                SECTION_COLUMNS
            ))
            .bind(level_id)
            .fetch_all(db)
            .await?;
            return Ok(sections);
        }

        let sections = sqlx::query_as::<_, Section>(&format!(
            "SELECT {} FROM sections ORDER BY created_at",
            SECTION_COLUMNS
        ))
        .fetch_all(db)
        .await?;

        Ok(sections)
    }

    #[instrument(skip(db))]
    pub async fn get_section_by_id(db: &PgPool, section_id: Uuid) -> Result<Section, AppError> {
        let section = sqlx::query_as::<_, Section>(&format!(
            "SELECT {} FROM sections WHERE id = $1",
            SECTION_COLUMNS
        ))
        .bind(section_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Section not found")))?;

        Ok(section)
    }

    #[instrument(skip(db, media, image))]
    pub async fn update_section(
        db: &PgPool,
        media: &dyn MediaStore,
        section_id: Uuid,
        dto: UpdateSectionDto,
        image: Option<UploadedFile>,
    ) -> Result<Section, AppError> {
        let existing = Self::get_section_by_id(db, section_id).await?;

        let new_image_ref = match &image {
            Some(file) => Some(
                media
                    .save("sections", &file.filename, &file.bytes)
                    .await
                    .map_err(AppError::storage)?,
            ),
            None => None,
        };

        let level_id = dto.level_id.unwrap_or(existing.level_id);
        let name = dto.name.unwrap_or(existing.name);
        let description = dto.description.or(existing.description);
        let image_ref = new_image_ref.clone().or(existing.image.clone());

        let result = sqlx::query_as::<_, Section>(&format!(
            "UPDATE sections
             SET level_id = $1, name = $2, description = $3, image = $4, updated_at = NOW()
             WHERE id = $5
             RETURNING {}",
            SECTION_COLUMNS
        ))
        .bind(level_id)
        .bind(&name)
        .bind(&description)
        .bind(&image_ref)
        .bind(section_id)
        .fetch_one(db)
        .await
        .map_err(Self::map_level_fk);

        match result {
            Ok(section) => {
                if new_image_ref.is_some()
                    && let Some(old) = existing.image
                {
                    delete_refs(media, [old]).await;
                }
                Ok(section)
            }
            Err(e) => {
                if let Some(reference) = new_image_ref {
                    delete_refs(media, [reference]).await;
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(db, media))]
    pub async fn delete_section(
        db: &PgPool,
        media: &dyn MediaStore,
        section_id: Uuid,
    ) -> Result<(), AppError> {
        let section = Self::get_section_by_id(db, section_id).await?;

        let mut refs: Vec<String> = Vec::new();
        if let Some(image) = section.image {
            refs.push(image);
        }

        let question_files = sqlx::query_scalar::<_, String>(
            "SELECT question_content FROM questions
             WHERE section_id = $1 AND question_type <> 'text' AND question_content IS NOT NULL",
        )
        .bind(section_id)
        .fetch_all(db)
        .await?;
        refs.extend(question_files);

        let choice_files = sqlx::query_scalar::<_, String>(
            "SELECT c.content
             FROM question_choices c
             JOIN questions q ON q.id = c.question_id
             WHERE q.section_id = $1 AND c.choice_type <> 'text' AND c.content IS NOT NULL",
        )
        .bind(section_id)
        .fetch_all(db)
        .await?;
        refs.extend(choice_files);

        sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section_id)
            .execute(db)
            .await?;

        delete_refs(media, refs).await;

        Ok(())
    }
}
