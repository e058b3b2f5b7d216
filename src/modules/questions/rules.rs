//! Answer-correctness rules enforced at write time.
//!
//! Pure checks over the proposed question state, run against the merged
//! result of an update so a partial edit cannot leave a question invalid.

use crate::utils::errors::AppError;

use super::model::{AnswerType, ChoiceType};

/// The validator's view of one choice: its kind, whether it ends up with
/// content (text, an existing reference, or a fresh upload), and its
/// correctness flag.
#[derive(Debug, Clone, Copy)]
pub struct ChoiceInput {
    pub choice_type: ChoiceType,
    pub has_content: bool,
    pub is_correct: bool,
}

pub fn validate_answers(
    answer_type: AnswerType,
    correct_answer: Option<&str>,
    choices: &[ChoiceInput],
) -> Result<(), AppError> {
    for choice in choices {
        if !choice.has_content {
            let message = match choice.choice_type {
                ChoiceType::Image | ChoiceType::Audio => "file required for choice",
                ChoiceType::Text => "content required for choice",
            };
            return Err(AppError::bad_request(anyhow::anyhow!("{}", message)));
        }
    }

    match answer_type {
        AnswerType::MultipleChoice => {
            if choices.is_empty() {
                return Err(AppError::bad_request(anyhow::anyhow!("choices required")));
            }
            if !choices.iter().any(|c| c.is_correct) {
                return Err(AppError::bad_request(anyhow::anyhow!("no correct choice")));
            }
        }
        AnswerType::FillInBlank => {
            // Choices may tag along but do not carry correctness.
            if correct_answer.map(str::trim).unwrap_or_default().is_empty() {
                return Err(AppError::bad_request(anyhow::anyhow!(
                    "correct_answer required"
                )));
            }
        }
    }

    Ok(())
}
