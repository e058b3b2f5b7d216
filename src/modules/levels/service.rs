use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{MediaStore, delete_refs};
use crate::utils::errors::AppError;
use crate::utils::upload::UploadedFile;

use super::model::{CreateLevelDto, Level, UpdateLevelDto};

const LEVEL_COLUMNS: &str = "id, name, description, image, created_at, updated_at";

/// Media lifecycle for content rows follows two ordering contracts:
/// a replacement file is saved before the old one is deleted, and a DB row
/// is deleted before its file. A DB failure after a file save triggers
/// compensating deletion of the new file, so a failed write never leaks a
/// referenced-by-nothing upload into a success path.
pub struct LevelService;

impl LevelService {
    fn map_name_conflict(e: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return AppError::conflict(anyhow::anyhow!("A level with this name already exists"));
        }
        AppError::from(e)
    }

    #[instrument(skip(db, media, image))]
    pub async fn create_level(
        db: &PgPool,
        media: &dyn MediaStore,
        dto: CreateLevelDto,
        image: Option<UploadedFile>,
    ) -> Result<Level, AppError> {
        let image_ref = match &image {
            Some(file) => Some(
                media
                    .save("levels", &file.filename, &file.bytes)
                    .await
                    .map_err(AppError::storage)?,
            ),
            None => None,
        };

        let result = sqlx::query_as::<_, Level>(&format!(
            "INSERT INTO levels (name, description, image)
             VALUES ($1, $2, $3)
             RETURNING {}",
            LEVEL_COLUMNS
        ))
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(&image_ref)
        .fetch_one(db)
        .await
        .map_err(Self::map_name_conflict);

        match result {
            Ok(level) => Ok(level),
            Err(e) => {
                if let Some(reference) = image_ref {
                    delete_refs(media, [reference]).await;
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(db))]
    pub async fn get_levels(db: &PgPool) -> Result<Vec<Level>, AppError> {
        let levels = sqlx::query_as::<_, Level>(&format!(
            "SELECT {} FROM levels ORDER BY created_at",
            LEVEL_COLUMNS
        ))
        .fetch_all(db)
        .await?;

        Ok(levels)
    }

    #[instrument(skip(db))]
    pub async fn get_level_by_id(db: &PgPool, level_id: Uuid) -> Result<Level, AppError> {
        let level = sqlx::query_as::<_, Level>(&format!(
            "SELECT {} FROM levels WHERE id = $1",
            LEVEL_COLUMNS
        ))
        .bind(level_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Level not found")))?;

        Ok(level)
    }

    #[instrument(skip(db, media, image))]
    pub async fn update_level(
        db: &PgPool,
        media: &dyn MediaStore,
        level_id: Uuid,
        dto: UpdateLevelDto,
        image: Option<UploadedFile>,
    ) -> Result<Level, AppError> {
        let existing = Self::get_level_by_id(db, level_id).await?;

        // New file first. The old one survives until the row update lands.
        let new_image_ref = match &image {
            Some(file) => Some(
                media
                    .save("levels", &file.filename, &file.bytes)
                    .await
                    .map_err(AppError::storage)?,
            ),
            None => None,
        };

        let name = dto.name.unwrap_or(existing.name);
        let description = dto.description.or(existing.description);
        let image_ref = new_image_ref.clone().or(existing.image.clone());

        let result = sqlx::query_as::<_, Level>(&format!(
            "UPDATE levels
             SET name = $1, description = $2, image = $3, updated_at = NOW()
             WHERE id = $4
             RETURNING {}",
            LEVEL_COLUMNS
        ))
        .bind(&name)
        .bind(&description)
        .bind(&image_ref)
        .bind(level_id)
        .fetch_one(db)
        .await
        .map_err(Self::map_name_conflict);

        match result {
            Ok(level) => {
                if new_image_ref.is_some()
                    && let Some(old) = existing.image
                {
                    delete_refs(media, [old]).await;
                }
                Ok(level)
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
    pub async fn delete_level(
        db: &PgPool,
        media: &dyn MediaStore,
        level_id: Uuid,
    ) -> Result<(), AppError> {
        let level = Self::get_level_by_id(db, level_id).await?;

        // Collect every media reference in the subtree before the cascade
        // erases the rows that point at them.
        let mut refs: Vec<String> = Vec::new();
        if let Some(image) = level.image {
            refs.push(image);
        }

        let section_images = sqlx::query_scalar::<_, String>(
            "SELECT image FROM sections WHERE level_id = $1 AND image IS NOT NULL",
        )
        .bind(level_id)
        .fetch_all(db)
        .await?;
        refs.extend(section_images);

        let question_files = sqlx::query_scalar::<_, String>(
            "SELECT q.question_content
             FROM questions q
             JOIN sections s ON s.id = q.section_id
             WHERE s.level_id = $1
               AND q.question_type <> 'text'
               AND q.question_content IS NOT NULL",
        )
        .bind(level_id)
        .fetch_all(db)
        .await?;
        refs.extend(question_files);

        let choice_files = sqlx::query_scalar::<_, String>(
            "SELECT c.content
             FROM question_choices c
             JOIN questions q ON q.id = c.question_id
             JOIN sections s ON s.id = q.section_id
             WHERE s.level_id = $1
               AND c.choice_type <> 'text'
               AND c.content IS NOT NULL",
        )
        .bind(level_id)
        .fetch_all(db)
        .await?;
        refs.extend(choice_files);

        sqlx::query("DELETE FROM levels WHERE id = $1")
            .bind(level_id)
            .execute(db)
            .await?;

        // Rows are gone; file deletion is best effort.
        delete_refs(media, refs).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::storage::StorageConfig;
    use crate::storage::LocalMediaStore;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> LocalMediaStore {
        LocalMediaStore::new(&StorageConfig {
            upload_dir: dir.path().to_path_buf(),
            max_file_size: 1024 * 1024,
        })
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    fn create_dto(name: &str) -> CreateLevelDto {
        CreateLevelDto {
            name: name.to_string(),
            description: Some("intro".to_string()),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_and_fetch_level(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level = LevelService::create_level(&pool, &store, create_dto("Beginner"), None)
            .await
            .unwrap();
        assert_eq!(level.name, "Beginner");
        assert!(level.image.is_none());

        let fetched = LevelService::get_level_by_id(&pool, level.id).await.unwrap();
        assert_eq!(fetched.id, level.id);

        let all = LevelService::get_levels(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_level_stores_image(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("a.png")))
                .await
                .unwrap();

        let reference = level.image.unwrap();
        assert!(reference.starts_with("levels/"));
        assert!(dir.path().join(&reference).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_name_conflicts_and_compensates_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        LevelService::create_level(&pool, &store, create_dto("Beginner"), None)
            .await
            .unwrap();

        let err =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("b.png")))
                .await
                .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        // The orphaned upload was compensated away.
        let leftover = std::fs::read_dir(dir.path().join("levels"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_image_and_deletes_old(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("a.png")))
                .await
                .unwrap();
        let old_ref = level.image.clone().unwrap();

        let updated = LevelService::update_level(
            &pool,
            &store,
            level.id,
            UpdateLevelDto {
                name: Some("Starter".to_string()),
                description: None,
            },
            Some(png("b.png")),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Starter");
        // Description untouched when the field is absent.
        assert_eq!(updated.description.as_deref(), Some("intro"));

        let new_ref = updated.image.unwrap();
        assert_ne!(new_ref, old_ref);
        assert!(dir.path().join(&new_ref).exists());
        assert!(!dir.path().join(&old_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_without_file_keeps_image(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("a.png")))
                .await
                .unwrap();
        let old_ref = level.image.clone().unwrap();

        let updated = LevelService::update_level(
            &pool,
            &store,
            level.id,
            UpdateLevelDto {
                name: None,
                description: Some("revised".to_string()),
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(updated.image.as_deref(), Some(old_ref.as_str()));
        assert!(dir.path().join(&old_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_level_removes_row_and_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("a.png")))
                .await
                .unwrap();
        let reference = level.image.clone().unwrap();

        LevelService::delete_level(&pool, &store, level.id)
            .await
            .unwrap();

        assert!(!dir.path().join(&reference).exists());
        let err = LevelService::get_level_by_id(&pool, level.id)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_level_cascades_full_tree_with_media(pool: PgPool) {
        use std::collections::HashMap;

        use crate::modules::questions::model::{
            AnswerType, ChoiceDto, ChoiceType, CreateQuestionDto, QuestionType,
        };
        use crate::modules::questions::service::QuestionService;
        use crate::modules::sections::model::CreateSectionDto;
        use crate::modules::sections::service::SectionService;

        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let level =
            LevelService::create_level(&pool, &store, create_dto("Beginner"), Some(png("a.png")))
                .await
                .unwrap();
        let section = SectionService::create_section(
            &pool,
            &store,
            CreateSectionDto {
                level_id: level.id,
                name: "Animals".to_string(),
                description: None,
            },
            Some(png("b.png")),
        )
        .await
        .unwrap();

        let mut choice_files = HashMap::new();
        choice_files.insert(0, png("dog.png"));
        let question = QuestionService::create_question(
            &pool,
            &store,
            CreateQuestionDto {
                section_id: section.id,
                question_type: QuestionType::Image,
                question_content: None,
                answer_type: AnswerType::MultipleChoice,
                correct_answer: None,
                choices: vec![
                    ChoiceDto {
                        choice_type: ChoiceType::Image,
                        content: None,
                        is_correct: false,
                    },
                    ChoiceDto {
                        choice_type: ChoiceType::Text,
                        content: Some("Dog".to_string()),
                        is_correct: true,
                    },
                ],
            },
            Some(png("bark.png")),
            choice_files,
        )
        .await
        .unwrap();

        let file_refs = [
            level.image.clone().unwrap(),
            section.image.clone().unwrap(),
            question.question.question_content.clone().unwrap(),
            question.choices[0].content.clone().unwrap(),
        ];
        for reference in &file_refs {
            assert!(dir.path().join(reference).exists());
        }

        LevelService::delete_level(&pool, &store, level.id)
            .await
            .unwrap();

        for table in ["levels", "sections", "questions", "question_choices"] {
            let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} still has rows");
        }
        for reference in &file_refs {
            assert!(!dir.path().join(reference).exists());
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_missing_level_not_found(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let err = LevelService::delete_level(&pool, &store, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
