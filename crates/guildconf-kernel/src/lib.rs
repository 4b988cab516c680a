pub mod forms;
pub mod handlers;
pub mod render;
pub mod route;
pub mod sections;
pub mod token;

use serde_json::Value;
use sha2::{Digest, Sha256};

pub use handlers::{ActionInput, FormInput, Handler, HandlerError, HandlerRegistry, Outcome, SectionHandler};
pub use render::RenderContext;
pub use route::{parse_route, Route, RouteParseError, Routed};
pub use sections::{default_tenant_document, SectionName, TenantDocument, UnknownSection};
pub use token::{RoutingToken, TokenError};

/// Canonical digest of a tenant document. Key order and number formatting do
/// not affect the result.
pub fn document_digest(doc: &TenantDocument) -> Result<String, String> {
    let value = serde_json::to_value(doc)
        .map_err(|err| format!("failed to serialize tenant document: {err}"))?;
    jcs_sha256_hex(&value)
}

pub fn jcs_sha256_hex(value: &Value) -> Result<String, String> {
    let canonical = serde_jcs::to_string(value)
        .map_err(|err| format!("failed to canonicalize JSON via JCS: {err}"))?;
    Ok(sha256_hex(canonical.as_bytes()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
