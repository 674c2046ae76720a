//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`. The endpoints clock
//! pages call (`/api/keyboard-control`, `/api/tournament-listen`) and
//! `/health` live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Aggregated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::system::health_handler,
        handlers::tournaments::create_tournament,
        handlers::tournaments::list_tournaments,
        handlers::tournaments::get_tournament,
        handlers::tournaments::delete_tournament,
        handlers::tournaments::apply_mutation,
        handlers::structures::create_structure,
        handlers::structures::list_structures,
        handlers::structures::get_structure,
        handlers::control::keyboard_control,
        handlers::control::tournament_listen,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::Mutation,
        crate::domain::KeyboardEvent,
        crate::domain::Level,
        crate::domain::Structure,
        crate::domain::StructureSlug,
        crate::domain::TournamentSlug,
        crate::domain::Transients,
        crate::service::TournamentDraft,
        crate::service::StructureDraft,
        dto::KeyboardControlRequest,
        dto::ListenRequest,
        dto::TournamentListResponse,
        dto::PaginationMeta,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Tournaments", description = "Tournament lifecycle and clock mutations"),
        (name = "Structures", description = "Level structures"),
        (name = "Control", description = "Keyboard control and live updates"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::control::routes())
        .merge(handlers::system::routes());
    #[cfg(feature = "swagger-ui")]
    let router = router.merge(handlers::docs::routes());
    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::PROTOCOL_VERSION;
    use crate::service::tournament_service::tests::service_with_clock;

    async fn app() -> (Router, i64) {
        let (service, _, structure_id) = service_with_clock().await;
        let state = AppState {
            service: Arc::new(service),
            listen_timeout: Duration::from_millis(50),
        };
        (build_router().with_state(state), structure_id.get())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("valid request");
        };
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("infallible service");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("readable body");
        };
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            let Ok(value) = serde_json::from_slice(&bytes) else {
                panic!("json body");
            };
            value
        };
        (status, value)
    }

    async fn create(app: &Router, structure_id: i64) -> i64 {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/tournaments",
            Some(json!({
                "name": "Friday Game",
                "handle": "friday",
                "structure_id": structure_id,
                "prize_pool_per_buy_in": 40,
                "paytable_id": 1,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let Some(id) = body.pointer("/id").and_then(Value::as_i64) else {
            panic!("id in {body}");
        };
        id
    }

    #[tokio::test]
    async fn health_reports_protocol() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/protocol_version").and_then(Value::as_i64),
            Some(PROTOCOL_VERSION)
        );
    }

    #[tokio::test]
    async fn mutation_round_trip() {
        let (app, structure_id) = app().await;
        let id = create(&app, structure_id).await;

        let uri = format!("/api/v1/tournaments/{id}/mutations");
        let (status, body) = send(&app, Method::POST, &uri, Some(json!({"op": "start_clock"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/version").and_then(Value::as_i64), Some(1));
        assert_eq!(
            body.pointer("/state/clock/mode").and_then(Value::as_str),
            Some("running")
        );

        let (status, body) = send(&app, Method::POST, &uri, Some(json!({"op": "previous_level"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.pointer("/error/code").and_then(Value::as_u64), Some(4002));
    }

    #[tokio::test]
    async fn out_of_range_time_mutations_are_400() {
        let (app, structure_id) = app().await;
        let id = create(&app, structure_id).await;
        let uri = format!("/api/v1/tournaments/{id}/mutations");
        for mutation in [
            json!({"op": "plus_time", "millis": i64::MAX}),
            json!({"op": "plus_time", "millis": -60_000}),
            json!({"op": "set_level_remaining", "millis": i64::MIN}),
        ] {
            let (status, body) = send(&app, Method::POST, &uri, Some(mutation)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body.pointer("/error/code").and_then(Value::as_u64), Some(1001));
        }
        let (_, body) = send(&app, Method::GET, &format!("/api/v1/tournaments/{id}"), None).await;
        assert_eq!(body.pointer("/version").and_then(Value::as_i64), Some(0));
    }

    #[tokio::test]
    async fn unknown_tournament_is_404() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/tournaments/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.pointer("/error/code").and_then(Value::as_u64), Some(2001));
    }

    #[tokio::test]
    async fn non_positive_id_is_rejected() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/tournaments/0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.pointer("/error/code").and_then(Value::as_u64), Some(1001));
    }

    #[tokio::test]
    async fn keyboard_control_accepts_page_casing() {
        let (app, structure_id) = app().await;
        let id = create(&app, structure_id).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/keyboard-control",
            Some(json!({"TournamentID": id, "Event": "AddPlayer", "Shift": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/state/current_players").and_then(Value::as_i64),
            Some(10)
        );
    }

    #[tokio::test]
    async fn listen_answers_stale_viewer_and_times_out_current_one() {
        let (app, structure_id) = app().await;
        let id = create(&app, structure_id).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/tournament-listen",
            Some(json!({"tournament_id": id, "version": -1, "protocol_version": PROTOCOL_VERSION})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/version").and_then(Value::as_i64), Some(0));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/tournament-listen",
            Some(json!({"tournament_id": id, "version": 0, "protocol_version": PROTOCOL_VERSION})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.pointer("/error/code").and_then(Value::as_u64), Some(3003));
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let (app, structure_id) = app().await;
        let id = create(&app, structure_id).await;
        let uri = format!("/api/v1/tournaments/{id}");
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn structures_and_listing() {
        let (app, structure_id) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/structures", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/v1/structures/{structure_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        create(&app, structure_id).await;
        let (status, body) = send(&app, Method::GET, "/api/v1/tournaments?limit=500", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/pagination/limit").and_then(Value::as_i64), Some(100));
        assert_eq!(body.pointer("/pagination/count").and_then(Value::as_u64), Some(1));
    }

    #[test]
    fn openapi_lists_listen_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/tournament-listen"));
    }
}
