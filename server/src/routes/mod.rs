use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, Config, SecurityHeadersLayer};
use crate::handlers::{auth, categories, events, health_check, tickets};
use crate::repositories::AppStore;
use crate::state::AppState;

pub fn create_routes<S: AppStore>(state: AppState<S>, config: &Config) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register::<S>))
        .route("/auth/login", post(auth::login::<S>))
        .route(
            "/categories",
            get(categories::list_categories::<S>).post(categories::create_category::<S>),
        )
        .route("/tickets/purchase", post(tickets::purchase_ticket::<S>))
        .route("/tickets/my", get(tickets::my_tickets::<S>))
        .route(
            "/events",
            get(events::list_events::<S>).post(events::create_event::<S>),
        )
        .route(
            "/events/:id",
            get(events::get_event::<S>)
                .put(events::update_event::<S>)
                .delete(events::delete_event::<S>),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SecurityHeadersLayer::new(config.production))
        .layer(create_cors_layer(&config.cors_allowed_origins))
}
