use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod boarding;
pub mod error;
pub mod flights;
pub mod passengers;
pub mod state;
pub mod summary_handler;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(flights::routes())
        .merge(passengers::routes())
        .merge(boarding::routes())
        .merge(summary_handler::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
