pub mod health;
pub mod project;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /projects                     list (optional auth), create (auth)
/// /projects/{id}                get (optional auth), update/delete (owner)
/// /projects/{id}/duplicate      duplicate (optional auth, read access)
///
/// /users/register               register (public)
/// /users/login                  login (public)
/// /users/me                     profile (auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", project::router())
        .nest("/users", user::router())
}
