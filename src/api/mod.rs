use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::time::Instant;

use crate::health::Snapshot;
use crate::service::StatusService;

/// JSON API consumed by the status widget
pub struct StatusApi {
    service: StatusService,
    started: Instant,
}

impl StatusApi {
    pub fn new(service: StatusService) -> Self {
        Self {
            service,
            started: Instant::now(),
        }
    }

    /// Handle an API request. Only method and path are inspected.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<BoxBody<Bytes, hyper::Error>> {
        let path = req.uri().path();
        let method = req.method();

        match (method.as_str(), path) {
            ("GET", "/status/check") => self.status_check().await,
            ("GET", "/" | "/health") => self.liveness(),
            (_, "/status/check" | "/" | "/health") => {
                self.error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            }
            _ => self.not_found(),
        }
    }

    async fn status_check(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Serialize)]
        struct StatusResponse<'a> {
            #[serde(flatten)]
            snapshot: &'a Snapshot,
            cache_ttl_seconds: u64,
        }

        let snapshot = self.service.get_status().await;
        let ttl = self.service.cache_ttl().as_secs();

        let mut response = self.json_response(&StatusResponse {
            snapshot: &snapshot,
            cache_ttl_seconds: ttl,
        });
        if let Ok(value) = format!("public, max-age={}", ttl).parse() {
            response.headers_mut().insert("cache-control", value);
        }
        response
    }

    fn liveness(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Serialize)]
        struct Liveness {
            status: &'static str,
            version: &'static str,
            uptime_seconds: u64,
        }

        self.json_response(&Liveness {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
        })
    }

    fn not_found(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        self.error_response(StatusCode::NOT_FOUND, "Not Found")
    }

    fn error_response(&self, status: StatusCode, message: &str) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Serialize)]
        struct ErrorResponse<'a> {
            error: &'a str,
        }
        let body = serde_json::to_string(&ErrorResponse { error: message })
            .unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, message));
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .header("access-control-allow-origin", "*")
            .body(Self::full_body(body))
            .unwrap()
    }

    fn json_response<T: Serialize>(&self, data: &T) -> Response<BoxBody<Bytes, hyper::Error>> {
        match serde_json::to_string(data) {
            Ok(json) => Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .header("access-control-allow-origin", "*")
                .body(Self::full_body(json))
                .unwrap(),
            Err(_) => self.error_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed"),
        }
    }

    fn full_body<T: Into<Bytes>>(content: T) -> BoxBody<Bytes, hyper::Error> {
        Full::new(content.into())
            .map_err(|never| match never {})
            .boxed()
    }
}
