use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_question, delete_question, get_choices, get_question_by_id, get_questions,
    update_question,
};

pub fn init_questions_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_question).get(get_questions))
        .route(
            "/{id}",
            get(get_question_by_id)
                .put(update_question)
                .delete(delete_question),
        )
        .route("/{id}/choices", get(get_choices))
}
