//! services/api/src/web/middleware.rs
//!
//! Authentication middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::web::{auth::resolve_user, state::AppState};

/// Resolves the session cookie and, when it names a live session, inserts the
/// `SessionUser` into request extensions. Anonymous requests pass through;
/// handlers that need a caller use the `CurrentUser` extractor.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = resolve_user(state.identity.as_ref(), req.headers()).await;
    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}
