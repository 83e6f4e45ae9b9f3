use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::variants,
        api::generate,
    ),
    components(
        schemas(api::GenerateRequest, api::HealthResponse)
    ),
    tags(
        (name = "cardgen", description = "Badge/banner compositing API")
    )
)]
pub struct ApiDoc;
