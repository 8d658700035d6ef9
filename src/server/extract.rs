//! Request extractors whose rejections use the API error envelope.
//!
//! axum's own `Json` and `Query` reject with plain-text bodies and insist on
//! a JSON content type. These wrappers accept any content type, treat an
//! empty body as `{}`, take the first value of a repeated query parameter,
//! and turn every rejection into `{ok:false, error}`.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::server::api_error::{ApiError, ErrorCode};

/// JSON request body. An empty body deserializes as `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            debug!("Failed to read request body: {rejection}");
            ApiError::with_message(ErrorCode::InvalidInput, rejection.body_text())
        })?;

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };

        serde_json::from_slice(body).map(JsonBody).map_err(|e| {
            debug!("Rejected request body: {e}");
            ApiError::with_message(ErrorCode::InvalidInput, format!("invalid JSON body: {e}"))
        })
    }
}

/// Query string parameters.
///
/// Values are strings; when a name repeats, the first occurrence wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                debug!("Rejected query string: {rejection}");
                ApiError::with_message(ErrorCode::InvalidInput, rejection.body_text())
            })?;

        let mut fields = Map::new();
        for (name, value) in pairs {
            fields.entry(name).or_insert(Value::String(value));
        }

        serde_json::from_value(Value::Object(fields))
            .map(QueryParams)
            .map_err(|e| {
                debug!("Rejected query parameters: {e}");
                ApiError::with_message(
                    ErrorCode::InvalidInput,
                    format!("invalid query string: {e}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        key: Option<String>,
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_object() {
        let JsonBody(payload) = JsonBody::<Payload>::from_request(request(""), &())
            .await
            .unwrap();
        assert!(payload.key.is_none());
    }

    #[tokio::test]
    async fn body_without_content_type_is_parsed() {
        let JsonBody(payload) = JsonBody::<Payload>::from_request(request(r#"{"key":"K"}"#), &())
            .await
            .unwrap();
        assert_eq!(payload.key.as_deref(), Some("K"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_input() {
        let err = JsonBody::<Payload>::from_request(request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(err.error.starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn query_params_are_decoded() {
        let req = Request::builder()
            .uri("/?key=SKU-WEEK-0000ABCD&device=dev%201")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        #[derive(Deserialize)]
        struct Params {
            key: Option<String>,
            device: Option<String>,
        }

        let QueryParams(params) = QueryParams::<Params>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(params.key.as_deref(), Some("SKU-WEEK-0000ABCD"));
        assert_eq!(params.device.as_deref(), Some("dev 1"));
    }

    #[tokio::test]
    async fn repeated_query_param_keeps_first_value() {
        let req = Request::builder()
            .uri("/?key=FIRST&key=SECOND")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        let QueryParams(params) = QueryParams::<Payload>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(params.key.as_deref(), Some("FIRST"));
    }
}
