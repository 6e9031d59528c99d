//! Built-in request handler
//!
//! Stands in for the bean handler: every request gets 200 OK with a JSON
//! description of what was asked.

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use serde_json::json;

use crate::dispatch::{Dispatch, DispatchFuture};

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl Dispatch for EchoHandler {
    fn dispatch(&self, request: Request<Incoming>) -> DispatchFuture {
        let body = json!({
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "query": request.uri().query(),
        });
        Box::pin(async move { build_json_response(StatusCode::OK, &body) })
    }
}

/// Build a JSON response, falling back to an empty 500 if the builder fails
pub fn build_json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build {status} response: {e}");
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_json_response() {
        let response = build_json_response(StatusCode::OK, &json!({"path": "/beans"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"path":"/beans"}"#);
    }
}
