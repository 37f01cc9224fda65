use super::handlers::{health, tokens};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tandem",
        description = "Paired access/refresh credential issuance and rotation",
        license(name = "BSD-3-Clause")
    ),
    paths(health::health, tokens::issue, tokens::refresh),
    components(schemas(health::Health, tokens::TokenExpiry)),
    tags(
        (name = "auth", description = "Credential issuance and rotation"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
