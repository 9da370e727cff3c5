use actix_web::{web, HttpRequest};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
struct ApiKeyQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

fn provided_key(req: &HttpRequest) -> Option<String> {
    let header = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    header.or_else(|| {
        web::Query::<ApiKeyQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().api_key)
    })
}

/// Checks the shared secret from the `x-api-key` header or the `apiKey`
/// query parameter.
pub fn require_api_key(req: &HttpRequest, expected: &str) -> Result<(), AppError> {
    let provided = match provided_key(req) {
        Some(key) => key,
        None => {
            warn!("Rejected {} {}: missing API key", req.method(), req.path());
            return Err(AppError::Unauthorized);
        }
    };

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        warn!("Rejected {} {}: wrong API key", req.method(), req.path());
        Err(AppError::Unauthorized)
    }
}
