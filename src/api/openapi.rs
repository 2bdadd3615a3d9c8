use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::health::{HealthResponse, ReadinessResponse};
use crate::api::handlers::upload::UploadForm;
use crate::application::dto::{FileDto, ListFilesResponse, StatsDto};

/// OpenAPI specification for the dedup storage API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dedup Storage API",
        version = "1.0.0",
        description = "File storage service that keeps one copy of identical content"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::health::readiness_handler,
        crate::api::handlers::upload::upload_handler,
        crate::api::handlers::list::list_handler,
        crate::api::handlers::download::get_handler,
        crate::api::handlers::download::download_handler,
        crate::api::handlers::delete::delete_handler,
        crate::api::handlers::stats::stats_handler,
    ),
    components(
        schemas(
            FileDto,
            ListFilesResponse,
            StatsDto,
            UploadForm,
            HealthResponse,
            ReadinessResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "files", description = "File upload, listing, download and deletion"),
        (name = "stats", description = "Deduplication statistics")
    )
)]
pub struct ApiDoc;

/// Create the Swagger UI route
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
