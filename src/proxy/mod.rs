use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};

use crate::error::Result;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw upstream reply. It goes back to the caller byte-for-byte unless the
/// manager rewrites the body for a skipped stack.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Relays requests to the real CloudFormation endpoint, overriding only
/// scheme and host. Method, headers and body pass through unchanged.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxyForwarder {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ForwardedResponse> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("https://{}{}", self.endpoint, path_and_query);

        let outbound = filter_request_headers(headers);

        tracing::debug!("forwarding {} {}", method, url);

        let response = self
            .client
            .request(method, &url)
            .headers(outbound)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        // The body is fully buffered before going back out, so framing
        // headers from the upstream connection no longer apply.
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);
        let body = response.bytes().await?;

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Everything passes through except headers the client recomputes for the
/// new target.
fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();
    for (name, value) in headers {
        if name == &header::HOST || name == &header::CONTENT_LENGTH {
            continue;
        }
        outbound.append(name, value.clone());
    }
    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn host_and_content_length_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8442"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("AWS4-HMAC-SHA256 Credential=abc"),
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

        let outbound = filter_request_headers(&headers);
        assert!(outbound.get(header::HOST).is_none());
        assert!(outbound.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            outbound.get(header::AUTHORIZATION).map(|v| v.to_str().unwrap()),
            Some("AWS4-HMAC-SHA256 Credential=abc")
        );
        assert_eq!(outbound.len(), 2);
    }
}
