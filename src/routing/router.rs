//! Builds the axum router for the API route table.
//!
//! Layering per route, outermost first:
//! `sanitize_params` → `validate_csrf_token` (mutating) → `require_auth`
//! (protected) → forward to the controller service.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::from_fn_with_state,
    routing::on,
    Router,
};

use crate::auth::require_auth;
use crate::http::forward::forward;
use crate::http::server::AppState;
use crate::routing::table::{RouteSpec, API_ROUTES};
use crate::security::csrf::validate_csrf_token;
use crate::security::input::sanitize_params;

/// Router for every entry of [`API_ROUTES`], to be nested under the API prefix.
pub fn api_router(state: AppState) -> Router {
    let mut router = Router::new();

    for spec in API_ROUTES {
        router = router.route(spec.path, route_for(spec, &state));
    }

    router
        .route_layer(from_fn_with_state(state.input.clone(), sanitize_params))
        .with_state(state)
}

fn route_for(spec: &'static RouteSpec, state: &AppState) -> axum::routing::MethodRouter<AppState> {
    let mut method_router = on(
        spec.method.filter(),
        move |State(state): State<AppState>, request: Request<Body>| async move {
            forward(state, spec, request).await
        },
    );

    // Layers added later run first: CSRF before authentication.
    if spec.auth {
        method_router =
            method_router.route_layer(from_fn_with_state(state.auth.clone(), require_auth));
    }
    if spec.csrf {
        method_router =
            method_router.route_layer(from_fn_with_state(state.csrf.clone(), validate_csrf_token));
    }

    method_router
}
