use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_section, delete_section, get_section_by_id, get_sections, update_section,
};

pub fn init_sections_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_section).get(get_sections))
        .route(
            "/{id}",
            get(get_section_by_id)
                .put(update_section)
                .delete(delete_section),
        )
}
