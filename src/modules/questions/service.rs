use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{MediaStore, delete_refs};
use crate::utils::errors::AppError;
use crate::utils::upload::UploadedFile;

use super::model::{
    AnswerType, ChoiceDto, ChoiceType, CreateQuestionDto, Question, QuestionChoice,
    QuestionType, QuestionWithChoices, UpdateQuestionDto,
};
use super::rules::{ChoiceInput, validate_answers};

const QUESTION_COLUMNS: &str =
    "id, section_id, question_type, question_content, answer_type, correct_answer, \
     created_at, updated_at";
const CHOICE_COLUMNS: &str =
    "id, question_id, choice_type, content, is_correct, created_at, updated_at";

fn non_empty(value: Option<&str>) -> bool {
    value.map(str::trim).is_some_and(|v| !v.is_empty())
}

/// Questions carry the full answer model: the correctness rules run against
/// the complete proposed state before any file or row is written, and media
/// follows the same save-new, write-rows, delete-old ordering as the rest
/// of the hierarchy.
pub struct QuestionService;

impl QuestionService {
    fn map_section_fk(e: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_foreign_key_violation()
        {
            return AppError::not_found(anyhow::anyhow!("Section not found"));
        }
        AppError::from(e)
    }

    /// Text questions need display text; image/audio questions need a fresh
    /// upload or an existing reference.
    fn check_question_content(
        question_type: QuestionType,
        content: Option<&str>,
        has_file: bool,
    ) -> Result<(), AppError> {
        match question_type {
            QuestionType::Text => {
                if !non_empty(content) {
                    return Err(AppError::bad_request(anyhow::anyhow!(
                        "question_content required"
                    )));
                }
            }
            QuestionType::Image | QuestionType::Audio => {
                if !has_file && !non_empty(content) {
                    return Err(AppError::bad_request(anyhow::anyhow!(
                        "question file required"
                    )));
                }
            }
        }
        Ok(())
    }

    fn choice_inputs(
        choices: &[ChoiceDto],
        choice_files: &HashMap<usize, UploadedFile>,
    ) -> Vec<ChoiceInput> {
        choices
            .iter()
            .enumerate()
            .map(|(i, c)| ChoiceInput {
                choice_type: c.choice_type,
                has_content: non_empty(c.content.as_deref()) || choice_files.contains_key(&i),
                is_correct: c.is_correct,
            })
            .collect()
    }

    async fn insert_choices(
        tx: &mut Transaction<'_, Postgres>,
        media: &dyn MediaStore,
        question_id: Uuid,
        choices: &[ChoiceDto],
        choice_files: &mut HashMap<usize, UploadedFile>,
        saved: &mut Vec<String>,
    ) -> Result<Vec<QuestionChoice>, AppError> {
        let mut rows = Vec::with_capacity(choices.len());

        for (i, choice) in choices.iter().enumerate() {
            let content = match choice_files.remove(&i) {
                Some(file) => {
                    let reference = media
                        .save("choices", &file.filename, &file.bytes)
                        .await
                        .map_err(AppError::storage)?;
                    saved.push(reference.clone());
                    Some(reference)
                }
                None => choice.content.clone(),
            };

            let row = sqlx::query_as::<_, QuestionChoice>(&format!(
                "INSERT INTO question_choices (question_id, choice_type, content, is_correct)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {}",
                CHOICE_COLUMNS
            ))
            .bind(question_id)
            .bind(choice.choice_type)
            .bind(&content)
            .bind(choice.is_correct)
            .fetch_one(&mut **tx)
            .await?;
            rows.push(row);
        }

        Ok(rows)
    }

    #[instrument(skip_all, fields(section_id = %dto.section_id))]
    pub async fn create_question(
        db: &PgPool,
        media: &dyn MediaStore,
        dto: CreateQuestionDto,
        question_file: Option<UploadedFile>,
        mut choice_files: HashMap<usize, UploadedFile>,
    ) -> Result<QuestionWithChoices, AppError> {
        // All rules run before the first byte hits the media store.
        Self::check_question_content(
            dto.question_type,
            dto.question_content.as_deref(),
            question_file.is_some(),
        )?;
        validate_answers(
            dto.answer_type,
            dto.correct_answer.as_deref(),
            &Self::choice_inputs(&dto.choices, &choice_files),
        )?;

        let mut saved: Vec<String> = Vec::new();

        let result = async {
            let question_content = match &question_file {
                Some(file) if dto.question_type != QuestionType::Text => {
                    let reference = media
                        .save("questions", &file.filename, &file.bytes)
                        .await
                        .map_err(AppError::storage)?;
                    saved.push(reference.clone());
                    Some(reference)
                }
                _ => dto.question_content.clone(),
            };

            let correct_answer = match dto.answer_type {
                AnswerType::FillInBlank => dto.correct_answer.clone(),
                AnswerType::MultipleChoice => None,
            };

            let mut tx = db.begin().await?;

            let question = sqlx::query_as::<_, Question>(&format!(
                "INSERT INTO questions (section_id, question_type, question_content, answer_type, correct_answer)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {}",
                QUESTION_COLUMNS
            ))
            .bind(dto.section_id)
            .bind(dto.question_type)
            .bind(&question_content)
            .bind(dto.answer_type)
            .bind(&correct_answer)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::map_section_fk)?;

            let choices = Self::insert_choices(
                &mut tx,
                media,
                question.id,
                &dto.choices,
                &mut choice_files,
                &mut saved,
            )
            .await?;

            tx.commit().await?;
            Ok(QuestionWithChoices { question, choices })
        }
        .await;

        if result.is_err() {
            delete_refs(media, saved).await;
        }
        result
    }

    #[instrument(skip(db))]
    pub async fn get_questions(
        db: &PgPool,
        section_id: Option<Uuid>,
    ) -> Result<Vec<QuestionWithChoices>, AppError> {
        let questions = if let Some(section_id) = section_id {
            let section_exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sections WHERE id = $1)",
            )
            .bind(section_id)
            .fetch_one(db)
            .await?;
            if !section_exists {
                return Err(AppError::not_found(anyhow::anyhow!("Section not found")));
            }

            sqlx::query_as::<_, Question>(&format!(
                "SELECT {} FROM questions WHERE section_id = $1 ORDER BY created_at",
                QUESTION_COLUMNS
            ))
            .bind(section_id)
            .fetch_all(db)
            .await?
        } else {
            sqlx::query_as::<_, Question>(&format!(
                "SELECT {} FROM questions ORDER BY created_at",
                QUESTION_COLUMNS
            ))
            .fetch_all(db)
            .await?
        };

        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let all_choices = sqlx::query_as::<_, QuestionChoice>(&format!(
            "SELECT {} FROM question_choices WHERE question_id = ANY($1) ORDER BY created_at",
            CHOICE_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(db)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<QuestionChoice>> = HashMap::new();
        for choice in all_choices {
            by_question.entry(choice.question_id).or_default().push(choice);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let choices = by_question.remove(&question.id).unwrap_or_default();
                QuestionWithChoices { question, choices }
            })
            .collect())
    }

    #[instrument(skip(db))]
    pub async fn get_question_by_id(
        db: &PgPool,
        question_id: Uuid,
    ) -> Result<QuestionWithChoices, AppError> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Question not found")))?;

        let choices = Self::get_choices_unchecked(db, question_id).await?;
        Ok(QuestionWithChoices { question, choices })
    }

    async fn get_choices_unchecked(
        db: &PgPool,
        question_id: Uuid,
    ) -> Result<Vec<QuestionChoice>, AppError> {
        let choices = sqlx::query_as::<_, QuestionChoice>(&format!(
            "SELECT {} FROM question_choices WHERE question_id = $1 ORDER BY created_at",
            CHOICE_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(db)
        .await?;
        Ok(choices)
    }

    #[instrument(skip(db))]
    pub async fn get_choices(
        db: &PgPool,
        question_id: Uuid,
    ) -> Result<Vec<QuestionChoice>, AppError> {
        let question_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM questions WHERE id = $1)")
                .bind(question_id)
                .fetch_one(db)
                .await?;
        if !question_exists {
            return Err(AppError::not_found(anyhow::anyhow!("Question not found")));
        }

        Self::get_choices_unchecked(db, question_id).await
    }

    #[instrument(skip_all, fields(question_id = %question_id))]
    pub async fn update_question(
        db: &PgPool,
        media: &dyn MediaStore,
        question_id: Uuid,
        dto: UpdateQuestionDto,
        question_file: Option<UploadedFile>,
        mut choice_files: HashMap<usize, UploadedFile>,
    ) -> Result<QuestionWithChoices, AppError> {
        let existing = Self::get_question_by_id(db, question_id).await?;

        // Merge first, then validate the state the update would leave
        // behind. Changing answer_type alone cannot sidestep the rules.
        let question_type = dto.question_type.unwrap_or(existing.question.question_type);
        let answer_type = dto.answer_type.unwrap_or(existing.question.answer_type);
        let correct_answer = dto
            .correct_answer
            .clone()
            .or_else(|| existing.question.correct_answer.clone());
        let merged_content = dto
            .question_content
            .clone()
            .or_else(|| existing.question.question_content.clone());

        Self::check_question_content(
            question_type,
            merged_content.as_deref(),
            question_file.is_some(),
        )?;

        let choice_inputs = match &dto.choices {
            Some(choices) => Self::choice_inputs(choices, &choice_files),
            None => existing
                .choices
                .iter()
                .map(|c| ChoiceInput {
                    choice_type: c.choice_type,
                    has_content: non_empty(c.content.as_deref()),
                    is_correct: c.is_correct,
                })
                .collect(),
        };
        validate_answers(answer_type, correct_answer.as_deref(), &choice_inputs)?;

        let mut saved: Vec<String> = Vec::new();

        let result = async {
            let question_content = match &question_file {
                Some(file) if question_type != QuestionType::Text => {
                    let reference = media
                        .save("questions", &file.filename, &file.bytes)
                        .await
                        .map_err(AppError::storage)?;
                    saved.push(reference.clone());
                    Some(reference)
                }
                _ => merged_content.clone(),
            };

            let correct_answer = match answer_type {
                AnswerType::FillInBlank => correct_answer.clone(),
                AnswerType::MultipleChoice => None,
            };

            let mut tx = db.begin().await?;

            let question = sqlx::query_as::<_, Question>(&format!(
                "UPDATE questions
                 SET section_id = $1, question_type = $2, question_content = $3,
                     answer_type = $4, correct_answer = $5, updated_at = NOW()
                 WHERE id = $6
                 RETURNING {}",
                QUESTION_COLUMNS
            ))
            .bind(dto.section_id.unwrap_or(existing.question.section_id))
            .bind(question_type)
            .bind(&question_content)
            .bind(answer_type)
            .bind(&correct_answer)
            .bind(question_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::map_section_fk)?;

            let choices = match &dto.choices {
                Some(new_choices) => {
                    sqlx::query("DELETE FROM question_choices WHERE question_id = $1")
                        .bind(question_id)
                        .execute(&mut *tx)
                        .await?;
                    Self::insert_choices(
                        &mut tx,
                        media,
                        question_id,
                        new_choices,
                        &mut choice_files,
                        &mut saved,
                    )
                    .await?
                }
                None => existing.choices.clone(),
            };

            tx.commit().await?;
            Ok(QuestionWithChoices { question, choices })
        }
        .await;

        match result {
            Ok(updated) => {
                // Rows are committed; now the displaced files can go.
                let mut old_refs: Vec<String> = Vec::new();
                if existing.question.question_type != QuestionType::Text
                    && let Some(old) = existing.question.question_content
                    && updated.question.question_content.as_deref() != Some(old.as_str())
                {
                    // Displaced by a fresh upload, or the question switched
                    // to text and no longer references a file.
                    old_refs.push(old);
                }
                if dto.choices.is_some() {
                    // A replacement choice may resend an existing reference as
                    // its content; those files are still live.
                    let kept: HashSet<&str> = updated
                        .choices
                        .iter()
                        .filter_map(|c| c.content.as_deref())
                        .collect();
                    for choice in &existing.choices {
                        if choice.choice_type != ChoiceType::Text
                            && let Some(content) = &choice.content
                            && !kept.contains(content.as_str())
                        {
                            old_refs.push(content.clone());
                        }
                    }
                }
                delete_refs(media, old_refs).await;
                Ok(updated)
            }
            Err(e) => {
                delete_refs(media, saved).await;
                Err(e)
            }
        }
    }

    #[instrument(skip(db, media))]
    pub async fn delete_question(
        db: &PgPool,
        media: &dyn MediaStore,
        question_id: Uuid,
    ) -> Result<(), AppError> {
        let existing = Self::get_question_by_id(db, question_id).await?;

        let mut refs: Vec<String> = Vec::new();
        if existing.question.question_type != QuestionType::Text
            && let Some(content) = existing.question.question_content
        {
            refs.push(content);
        }
        for choice in existing.choices {
            if choice.choice_type != ChoiceType::Text
                && let Some(content) = choice.content
            {
                refs.push(content);
            }
        }

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(db)
            .await?;

        delete_refs(media, refs).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::storage::StorageConfig;
    use crate::modules::levels::model::CreateLevelDto;
    use crate::modules::levels::service::LevelService;
    use crate::modules::sections::model::CreateSectionDto;
    use crate::modules::sections::service::SectionService;
    use crate::storage::LocalMediaStore;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> LocalMediaStore {
        LocalMediaStore::new(&StorageConfig {
            upload_dir: dir.path().to_path_buf(),
            max_file_size: 1024 * 1024,
        })
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: vec![1, 2, 3, 4],
        }
    }

    async fn seed_section(pool: &PgPool, store: &LocalMediaStore) -> Uuid {
        let level = LevelService::create_level(
            pool,
            store,
            CreateLevelDto {
                name: "Beginner".to_string(),
                description: None,
            },
            None,
        )
        .await
        .unwrap();
        SectionService::create_section(
            pool,
            store,
            CreateSectionDto {
                level_id: level.id,
                name: "Greetings".to_string(),
                description: None,
            },
            None,
        )
        .await
        .unwrap()
        .id
    }

    fn text_choice(content: &str, is_correct: bool) -> ChoiceDto {
        ChoiceDto {
            choice_type: ChoiceType::Text,
            content: Some(content.to_string()),
            is_correct,
        }
    }

    fn mc_dto(section_id: Uuid, choices: Vec<ChoiceDto>) -> CreateQuestionDto {
        CreateQuestionDto {
            section_id,
            question_type: QuestionType::Text,
            question_content: Some("How do you say hello?".to_string()),
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_multiple_choice_question(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let created = QuestionService::create_question(
            &pool,
            &store,
            mc_dto(
                section_id,
                vec![text_choice("Bonjour", true), text_choice("Au revoir", false)],
            ),
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(created.choices.len(), 2);
        assert!(created.choices.iter().any(|c| c.is_correct));
        assert!(created.question.correct_answer.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_empty_choices(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let err =
            QuestionService::create_question(&pool, &store, mc_dto(section_id, vec![]), None, HashMap::new())
                .await
                .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.error.to_string().contains("choices required"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_rejects_no_correct_choice(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let err = QuestionService::create_question(
            &pool,
            &store,
            mc_dto(section_id, vec![text_choice("Bonjour", false)]),
            None,
            HashMap::new(),
        )
        .await
        .unwrap_err();
        assert!(err.error.to_string().contains("no correct choice"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_fill_in_blank_requires_answer(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let mut dto = mc_dto(section_id, vec![]);
        dto.answer_type = AnswerType::FillInBlank;

        let err = QuestionService::create_question(&pool, &store, dto, None, HashMap::new())
            .await
            .unwrap_err();
        assert!(err.error.to_string().contains("correct_answer required"));

        let mut dto = mc_dto(section_id, vec![]);
        dto.answer_type = AnswerType::FillInBlank;
        dto.correct_answer = Some("bonjour".to_string());
        let created = QuestionService::create_question(&pool, &store, dto, None, HashMap::new())
            .await
            .unwrap();
        assert_eq!(created.question.correct_answer.as_deref(), Some("bonjour"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_with_media_files(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Audio,
            question_content: None,
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices: vec![
                ChoiceDto {
                    choice_type: ChoiceType::Image,
                    content: None,
                    is_correct: true,
                },
                text_choice("Not this", false),
            ],
        };
        let mut choice_files = HashMap::new();
        choice_files.insert(0, file("dog.png"));

        let created = QuestionService::create_question(
            &pool,
            &store,
            dto,
            Some(file("bark.mp3")),
            choice_files,
        )
        .await
        .unwrap();

        let question_ref = created.question.question_content.clone().unwrap();
        assert!(question_ref.starts_with("questions/"));
        assert!(dir.path().join(&question_ref).exists());

        let choice_ref = created.choices[0].content.clone().unwrap();
        assert!(choice_ref.starts_with("choices/"));
        assert!(dir.path().join(&choice_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_media_choice_without_file_rejected(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Text,
            question_content: Some("Which sound?".to_string()),
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices: vec![ChoiceDto {
                choice_type: ChoiceType::Audio,
                content: None,
                is_correct: true,
            }],
        };

        let err = QuestionService::create_question(&pool, &store, dto, None, HashMap::new())
            .await
            .unwrap_err();
        assert!(err.error.to_string().contains("file required for choice"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_unknown_section_compensates_files(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let dto = CreateQuestionDto {
            section_id: Uuid::new_v4(),
            question_type: QuestionType::Image,
            question_content: None,
            answer_type: AnswerType::FillInBlank,
            correct_answer: Some("chat".to_string()),
            choices: vec![],
        };

        let err = QuestionService::create_question(
            &pool,
            &store,
            dto,
            Some(file("cat.png")),
            HashMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let leftover = std::fs::read_dir(dir.path().join("questions"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_cannot_strip_correct_choice(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let created = QuestionService::create_question(
            &pool,
            &store,
            mc_dto(section_id, vec![text_choice("Bonjour", true)]),
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        let err = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                choices: Some(vec![text_choice("Au revoir", false)]),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap_err();
        assert!(err.error.to_string().contains("no correct choice"));

        // The stored choice set is untouched.
        let choices = QuestionService::get_choices(&pool, created.question.id)
            .await
            .unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].content.as_deref(), Some("Bonjour"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_answer_type_switch_revalidates(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let created = QuestionService::create_question(
            &pool,
            &store,
            mc_dto(section_id, vec![text_choice("Bonjour", true)]),
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        // Switching to fill_in_blank without supplying an answer fails
        // against the merged state.
        let err = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                answer_type: Some(AnswerType::FillInBlank),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap_err();
        assert!(err.error.to_string().contains("correct_answer required"));

        let updated = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                answer_type: Some(AnswerType::FillInBlank),
                correct_answer: Some("bonjour".to_string()),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(updated.question.answer_type, AnswerType::FillInBlank);
        assert_eq!(updated.question.correct_answer.as_deref(), Some("bonjour"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_question_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Audio,
            question_content: None,
            answer_type: AnswerType::FillInBlank,
            correct_answer: Some("woof".to_string()),
            choices: vec![],
        };
        let created = QuestionService::create_question(
            &pool,
            &store,
            dto,
            Some(file("old.mp3")),
            HashMap::new(),
        )
        .await
        .unwrap();
        let old_ref = created.question.question_content.clone().unwrap();

        let updated = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto::default(),
            Some(file("new.mp3")),
            HashMap::new(),
        )
        .await
        .unwrap();

        let new_ref = updated.question.question_content.unwrap();
        assert_ne!(new_ref, old_ref);
        assert!(dir.path().join(&new_ref).exists());
        assert!(!dir.path().join(&old_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_switch_to_text_deletes_old_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Audio,
            question_content: None,
            answer_type: AnswerType::FillInBlank,
            correct_answer: Some("woof".to_string()),
            choices: vec![],
        };
        let created = QuestionService::create_question(
            &pool,
            &store,
            dto,
            Some(file("bark.mp3")),
            HashMap::new(),
        )
        .await
        .unwrap();
        let old_ref = created.question.question_content.clone().unwrap();

        let updated = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                question_type: Some(QuestionType::Text),
                question_content: Some("What sound does a dog make?".to_string()),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(updated.question.question_type, QuestionType::Text);
        assert!(!dir.path().join(&old_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_resending_choice_reference_keeps_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Text,
            question_content: Some("Which animal barks?".to_string()),
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices: vec![
                ChoiceDto {
                    choice_type: ChoiceType::Image,
                    content: None,
                    is_correct: false,
                },
                text_choice("Cat", true),
            ],
        };
        let mut choice_files = HashMap::new();
        choice_files.insert(0, file("dog.png"));

        let created =
            QuestionService::create_question(&pool, &store, dto, None, choice_files)
                .await
                .unwrap();
        let choice_ref = created.choices[0].content.clone().unwrap();

        // Resend the same reference as content, flipping correctness only.
        let updated = QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                choices: Some(vec![
                    ChoiceDto {
                        choice_type: ChoiceType::Image,
                        content: Some(choice_ref.clone()),
                        is_correct: true,
                    },
                    text_choice("Cat", false),
                ]),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(updated.choices[0].content.as_deref(), Some(choice_ref.as_str()));
        assert!(updated.choices[0].is_correct);
        assert!(dir.path().join(&choice_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_dropping_media_choice_deletes_file(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Text,
            question_content: Some("Which animal barks?".to_string()),
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices: vec![
                ChoiceDto {
                    choice_type: ChoiceType::Image,
                    content: None,
                    is_correct: false,
                },
                text_choice("Cat", true),
            ],
        };
        let mut choice_files = HashMap::new();
        choice_files.insert(0, file("dog.png"));

        let created =
            QuestionService::create_question(&pool, &store, dto, None, choice_files)
                .await
                .unwrap();
        let choice_ref = created.choices[0].content.clone().unwrap();

        QuestionService::update_question(
            &pool,
            &store,
            created.question.id,
            UpdateQuestionDto {
                choices: Some(vec![text_choice("Dog", true)]),
                ..UpdateQuestionDto::default()
            },
            None,
            HashMap::new(),
        )
        .await
        .unwrap();

        assert!(!dir.path().join(&choice_ref).exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_question_removes_rows_and_files(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let dto = CreateQuestionDto {
            section_id,
            question_type: QuestionType::Image,
            question_content: None,
            answer_type: AnswerType::MultipleChoice,
            correct_answer: None,
            choices: vec![
                ChoiceDto {
                    choice_type: ChoiceType::Audio,
                    content: None,
                    is_correct: true,
                },
            ],
        };
        let mut choice_files = HashMap::new();
        choice_files.insert(0, file("meow.wav"));

        let created = QuestionService::create_question(
            &pool,
            &store,
            dto,
            Some(file("cat.png")),
            choice_files,
        )
        .await
        .unwrap();
        let question_ref = created.question.question_content.clone().unwrap();
        let choice_ref = created.choices[0].content.clone().unwrap();

        QuestionService::delete_question(&pool, &store, created.question.id)
            .await
            .unwrap();

        assert!(!dir.path().join(&question_ref).exists());
        assert!(!dir.path().join(&choice_ref).exists());

        let err = QuestionService::get_question_by_id(&pool, created.question.id)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_questions_distinguishes_empty_from_missing(pool: PgPool) {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let section_id = seed_section(&pool, &store).await;

        let questions = QuestionService::get_questions(&pool, Some(section_id))
            .await
            .unwrap();
        assert!(questions.is_empty());

        let err = QuestionService::get_questions(&pool, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_choices_for_missing_question_not_found(pool: PgPool) {
        let err = QuestionService::get_choices(&pool, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
