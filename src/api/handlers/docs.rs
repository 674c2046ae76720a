//! Swagger UI backed by the generated OpenAPI document.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::ApiDoc;
use crate::app_state::AppState;

/// Serves the UI at `/docs` and the document at `/api-doc/openapi.json`.
pub fn routes() -> Router<AppState> {
    SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into()
}
