use super::handlers::relay;
use crate::services::Manager;
use axum::Router;

#[derive(Clone)]
pub struct AppState {
    pub manager: Manager,
}

/// Every request, any method and any path, goes through the relay.
pub fn create_router(manager: Manager) -> Router {
    let state = AppState { manager };

    Router::new().fallback(relay::relay).with_state(state)
}
