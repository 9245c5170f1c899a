use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{verify_access_token, AdminToken, AuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::notifications())
        .merge(routes::push())
        .merge(routes::admin());

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .with_state(state)
}
