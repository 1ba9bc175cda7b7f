use std::sync::Arc;

use axum::extract::FromRef;

use crate::services::{AuthService, CategoryService, EventService, TicketService};
use crate::utils::auth::JwtKeys;

/// Services wired once over a shared store handle and cloned per request.
#[derive(Clone)]
pub struct AppState<S> {
    pub auth: AuthService<S>,
    pub categories: CategoryService<S>,
    pub tickets: TicketService<S>,
    pub events: EventService<S>,
    pub jwt: Arc<JwtKeys>,
}

impl<S: Clone> AppState<S> {
    pub fn new(store: S, jwt: JwtKeys) -> Self {
        let jwt = Arc::new(jwt);
        Self {
            auth: AuthService::new(store.clone(), Arc::clone(&jwt)),
            categories: CategoryService::new(store.clone()),
            tickets: TicketService::new(store.clone()),
            events: EventService::new(store),
            jwt,
        }
    }
}

impl<S> FromRef<AppState<S>> for Arc<JwtKeys> {
    fn from_ref(state: &AppState<S>) -> Self {
        Arc::clone(&state.jwt)
    }
}
