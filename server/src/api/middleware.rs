//! Cross-origin policy and the unmatched-route fallback

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::is_all_interfaces;
use crate::core::constants::{TENANT_HEADER, VIEWER_HEADER};

/// Browser origins allowed to call the API.
///
/// Derived from the bind address: local binds admit both localhost
/// spellings, a named host admits only itself. The portal SPA dev
/// server runs one port above the API, so that port is included.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    pub fn new(host: &str, port: u16) -> Self {
        let local = is_all_interfaces(host) || host == "127.0.0.1" || host == "localhost";
        let named = [host];
        let hosts: &[&str] = if local {
            &["localhost", "127.0.0.1"]
        } else {
            &named
        };

        // The SPA port does not exist when the API sits on 65535
        let spa_port = port.checked_add(1);
        let mut origins = Vec::new();
        for h in hosts {
            origins.push(format!("http://{h}:{port}"));
            if let Some(spa) = spa_port {
                origins.push(format!("http://{h}:{spa}"));
            }
            origins.push(format!("http://{h}"));
        }

        Self { origins }
    }

    fn header_values(&self) -> Vec<HeaderValue> {
        self.origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect()
    }
}

pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(VIEWER_HEADER),
        ])
        .allow_credentials(true)
}

const UNMATCHED_BODY_CAP: usize = 64 * 1024;

/// Fallback for unmatched routes.
///
/// Serves a bare 404; when debug logging is on, dumps the whole
/// request first so a misrouted client can be diagnosed from logs.
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if tracing::enabled!(tracing::Level::DEBUG) {
        dump_unmatched_request(req).await;
    }
    StatusCode::NOT_FOUND
}

async fn dump_unmatched_request(req: Request) {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let header_map: serde_json::Map<String, serde_json::Value> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let text = value.to_str().ok()?;
            Some((name.to_string(), serde_json::Value::String(text.into())))
        })
        .collect();

    let Ok(body_bytes) = to_bytes(req.into_body(), UNMATCHED_BODY_CAP).await else {
        tracing::debug!(%method, %uri, "Unmatched route, body unreadable");
        return;
    };

    let body = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else if let Ok(json) = serde_json::from_slice(&body_bytes) {
        json
    } else {
        match String::from_utf8(body_bytes.to_vec()) {
            Ok(text) => serde_json::Value::String(text),
            Err(_) => serde_json::Value::String(format!("<{} raw bytes>", body_bytes.len())),
        }
    };

    let dump = serde_json::json!({
        "status": 404,
        "method": method.to_string(),
        "url": uri.to_string(),
        "headers": header_map,
        "body": body,
    });

    match serde_json::to_string_pretty(&dump) {
        Ok(pretty) => tracing::debug!("Unmatched route\n{pretty}"),
        Err(_) => tracing::debug!(%method, %uri, "Unmatched route"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins_localhost() {
        let allowed = AllowedOrigins::new("127.0.0.1", 5000);
        assert!(allowed.origins.contains(&"http://localhost:5000".to_string()));
        assert!(allowed.origins.contains(&"http://127.0.0.1:5001".to_string()));
        assert!(!allowed.origins.contains(&"http://example.com".to_string()));
    }

    #[test]
    fn test_allowed_origins_custom_host() {
        let allowed = AllowedOrigins::new("portal.internal", 8080);
        assert!(
            allowed
                .origins
                .contains(&"http://portal.internal:8080".to_string())
        );
        assert!(!allowed.origins.contains(&"http://localhost:8080".to_string()));
    }

    #[test]
    fn test_allowed_origins_at_port_ceiling() {
        // No port above 65535 exists; only the SPA origin drops out
        let allowed = AllowedOrigins::new("127.0.0.1", u16::MAX);
        assert!(
            allowed
                .origins
                .contains(&"http://localhost:65535".to_string())
        );
        assert!(!allowed.origins.iter().any(|o| o.contains("65536")));
    }
}
