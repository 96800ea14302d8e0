//! HTTP helpers for the Lambda handler.
//!
//! Every response carries the CORS headers for the single allowed origin.

use lambda_http::http::response::Builder;
use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Informational body: `{"message": "..."}`.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

fn with_cors(status: u16, allowed_origin: &str) -> Builder {
    Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", allowed_origin)
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(
    status: u16,
    allowed_origin: &str,
    data: &T,
) -> Result<Response<Body>, lambda_http::Error> {
    Ok(with_cors(status, allowed_origin)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(
    status: u16,
    allowed_origin: &str,
    message: impl Into<String>,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, allowed_origin, &ErrorBody { error: message.into() })
}

/// Create a `{"message": ...}` response.
pub fn message_response(
    status: u16,
    allowed_origin: &str,
    message: impl Into<String>,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, allowed_origin, &MessageBody { message: message.into() })
}

/// Empty 200 answer to a CORS preflight.
pub fn preflight_response(allowed_origin: &str) -> Result<Response<Body>, lambda_http::Error> {
    Ok(with_cors(200, allowed_origin).body(Body::Empty)?)
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// An empty body parses as `T::default()`. Returns `Ok(Ok(T))` on success,
/// `Ok(Err(Response))` on parse error (400), or `Err(lambda_http::Error)`
/// on serialization failure.
pub fn parse_json_body<T: DeserializeOwned + Default>(
    body: &Body,
    allowed_origin: &str,
) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    let bytes: &[u8] = body.as_ref();
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Ok(T::default()));
    }
    match serde_json::from_slice(bytes) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response =
                error_response(400, allowed_origin, format!("Invalid request body: {}", e))?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: ChatRequest = parse_body!(event.body(), &config.allowed_origin);
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr, $origin:expr) => {
        match shared::http::parse_json_body($body, $origin)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Ping {
        #[serde(default)]
        message: String,
    }

    fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
        response.headers()[name].to_str().unwrap()
    }

    #[test]
    fn test_cors_headers_on_json() {
        let response = error_response(500, "https://shop.example", "boom").unwrap();
        assert_eq!(response.status(), 500);
        assert_eq!(header(&response, "Access-Control-Allow-Origin"), "https://shop.example");
        assert_eq!(header(&response, "Access-Control-Allow-Methods"), "POST, OPTIONS");
        assert_eq!(header(&response, "Access-Control-Allow-Headers"), "Content-Type");
        let bytes: &[u8] = response.body().as_ref();
        assert_eq!(bytes, br#"{"error":"boom"}"#);
    }

    #[test]
    fn test_preflight_is_empty_200() {
        let response = preflight_response("https://shop.example").unwrap();
        assert_eq!(response.status(), 200);
        let bytes: &[u8] = response.body().as_ref();
        assert!(bytes.is_empty());
        assert_eq!(header(&response, "Access-Control-Allow-Origin"), "https://shop.example");
    }

    #[test]
    fn test_parse_json_body() {
        let parsed: Ping = parse_json_body(&Body::from(r#"{"message":"hi"}"#), "o")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.message, "hi");

        let empty: Ping = parse_json_body(&Body::Empty, "o").unwrap().unwrap();
        assert_eq!(empty.message, "");

        let rejected = parse_json_body::<Ping>(&Body::from("{not json"), "o")
            .unwrap()
            .unwrap_err();
        assert_eq!(rejected.status(), 400);
    }
}
