use utoipa::OpenApi;

use crate::routes::{generate, health, upload};

#[derive(OpenApi)]
#[openapi(info(
    title = "amadeus-server",
    description = "Amadeus / Galileo GDS learning assistant API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root.merge(upload::UploadApi::openapi());
    root
}

#[cfg(test)]
mod test {
    #[test]
    fn documents_every_route() {
        let doc = super::get_docs();
        for path in ["/health", "/api/generate", "/api/galileo", "/api/upload"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
