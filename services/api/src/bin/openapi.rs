//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the REST API. The output path defaults to
//! `openapi.json` and may be given as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let mut doc = ApiDoc::openapi();
    doc.info.title = "FAQ Generator API".to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();

    std::fs::write(&path, doc.to_pretty_json()?)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}
