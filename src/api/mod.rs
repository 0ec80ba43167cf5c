// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ApiError, state::AppState};

pub mod health;
pub mod users;

/// Swagger UI mount point.
pub const SWAGGER_UI_PATH: &str = "/swagger";
/// OpenAPI document location.
pub const OPENAPI_JSON_PATH: &str = "/swagger/v1/swagger.json";

/// Build the application router.
///
/// Swagger UI and the OpenAPI document are mounted only when `expose_docs`
/// is set.
pub fn router(state: AppState, expose_docs: bool) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let mut app = Router::new().nest("/v1", v1_routes).merge(health_routes);

    if expose_docs {
        app = app.merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi()));
    }

    app.fallback(route_not_found)
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[derive(OpenApi)]
#[openapi(
    info(title = "BancoAna - API Transferência", version = "v1"),
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::get_current_user
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::UserMeResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Users", description = "Authenticated caller information")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT security scheme referenced by protected paths.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::tests::{shared_key_config, sign, test_state, valid_claims, SECRET};
    use crate::state::AuthConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn send_get(app: Router, uri: &str, bearer: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn every_route_is_mounted() {
        let app = router(test_state(shared_key_config()), true);
        let token = sign(valid_claims(), SECRET);

        for uri in ["/health", "/health/live", "/health/ready"] {
            let (status, _) = send_get(app.clone(), uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
        }
        let (status, _) = send_get(app, "/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(test_state(AuthConfig::default()), false);
        let (status, body) = send_get(app, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn request_id_is_returned() {
        let app = router(test_state(AuthConfig::default()), false);
        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn docs_are_hidden_unless_enabled() {
        let hidden = router(test_state(AuthConfig::default()), false);
        let (status, _) = send_get(hidden.clone(), OPENAPI_JSON_PATH, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_get(hidden, "/swagger/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let shown = router(test_state(AuthConfig::default()), true);
        let (status, body) = send_get(shown.clone(), "/swagger/v1/swagger.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "BancoAna - API Transferência");
        assert!(body["components"]["securitySchemes"]["bearer"].is_object());

        let (status, _) = send_get(shown, "/swagger/", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn current_user_requires_token() {
        let app = router(test_state(shared_key_config()), false);
        let (status, body) = send_get(app, "/v1/users/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn current_user_with_valid_token() {
        let app = router(test_state(shared_key_config()), false);
        let token = sign(valid_claims(), SECRET);
        let (status, body) = send_get(app, "/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], "conta_123");
        assert_eq!(body["scopes"][0], "transferencia.write");
    }

    #[tokio::test]
    async fn protected_routes_fail_closed_without_auth_config() {
        let app = router(test_state(AuthConfig::default()), false);
        let token = sign(valid_claims(), SECRET);
        let (status, body) = send_get(app, "/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_code"], "auth_not_configured");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = router(test_state(AuthConfig::default()), false);
        let (status, body) = send_get(app, "/v1/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }
}
