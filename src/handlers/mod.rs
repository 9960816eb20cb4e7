pub mod auth;

use axum::http::{header, request::Parts};

use crate::middleware::client_origin;

/// Origin address and client descriptor pulled from the request, available
/// to every handler without a fallible extractor.
pub struct RequestMeta {
    pub origin: String,
    pub client: Option<String>,
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            origin: client_origin(&parts.headers, &parts.extensions),
            client: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        })
    }
}
