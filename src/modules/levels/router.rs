use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{create_level, delete_level, get_level_by_id, get_levels, update_level};

pub fn init_levels_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_level).get(get_levels))
        .route(
            "/{id}",
            get(get_level_by_id).put(update_level).delete(delete_level),
        )
}
