//! Writes the Improv API's OpenAPI document.
//!
//! Usage: `openapi [OUTPUT]`; the output path defaults to `openapi.json`.

use improv_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let doc = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&output, doc)?;
    println!("Wrote OpenAPI document to {}", output.display());
    Ok(())
}
