//! The mirrored request and its header construction rules.

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use tracing::warn;

use crate::config::HeaderTemplate;
use crate::context::TemplateEngine;

/// The request handed to the shadow connector: method and URI inherited from
/// the primary request, headers equal to the primary's with the configured
/// templates overlaid.
///
/// Built once per shadowed request and owned by the queued connection until
/// the connector takes it.
#[derive(Debug, Clone)]
pub struct ShadowRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl ShadowRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self { method, uri, headers }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Overlays the configured header templates on the primary request's headers.
///
/// Templates apply in configuration order, so a later duplicate name
/// overwrites an earlier one. Entries with a blank name are skipped. A
/// template that fails to evaluate, or that produces an invalid header name or
/// value, is skipped with a warning and leaves any original header unchanged;
/// header construction itself never fails.
pub(crate) fn build_shadowing_headers(primary: &HeaderMap, templates: &[HeaderTemplate], engine: &dyn TemplateEngine) -> HeaderMap {
    let mut headers = primary.clone();

    for template in templates {
        let name = template.name().trim();
        if name.is_empty() {
            continue;
        }

        let value = match engine.evaluate(template.value()) {
            Ok(value) => value,
            Err(e) => {
                warn!(header = name, error = %e, "skipping shadowing header, evaluation failed");
                continue;
            }
        };

        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!(header = template.name(), "skipping shadowing header, invalid header name");
            continue;
        };

        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => {
                warn!(header = %name, "skipping shadowing header, evaluated value is not a valid header value");
            }
        }
    }

    headers
}
