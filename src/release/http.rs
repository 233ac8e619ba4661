//! HTTP fetch primitive shared by every network-backed source

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::release::error::ReleaseError;

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "release-finder";

/// Thin wrapper over `reqwest::Client` that maps HTTP failures to [`ReleaseError`]
///
/// Cloning is cheap and clones share one connection pool, so a single instance
/// can back concurrent enumerations.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self, ReleaseError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// GET `url` and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, ReleaseError> {
        let response = self.send(self.client.get(url), url, headers).await?;
        response.json().await.map_err(|e| {
            warn!("Failed to parse JSON from {}: {}", url, e);
            ReleaseError::InvalidResponse(e.to_string())
        })
    }

    /// GET `url` and return the body as text
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, ReleaseError> {
        let response = self.send(self.client.get(url), url, headers).await?;
        response.text().await.map_err(|e| {
            warn!("Failed to read response from {}: {}", url, e);
            ReleaseError::InvalidResponse(e.to_string())
        })
    }

    /// GET `url` and return the raw body
    pub async fn get_bytes(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, ReleaseError> {
        let response = self.send(self.client.get(url), url, headers).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// POST a JSON body to `url` and deserialize the JSON answer
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ReleaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.client.post(url).json(body), url, headers).await?;
        response.json().await.map_err(|e| {
            warn!("Failed to parse JSON from {}: {}", url, e);
            ReleaseError::InvalidResponse(e.to_string())
        })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Response, ReleaseError> {
        let request = headers
            .iter()
            .fold(request, |request, (name, value)| request.header(*name, *value));

        debug!("Fetching {}", url);
        let response = request.send().await?;
        check_status(response, url)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, ReleaseError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(ReleaseError::NotFound(url.to_string()));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ReleaseError::InvalidCredential(format!(
            "{} returned {}",
            url, status
        )));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ReleaseError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Upstream returned status {}: {}", status, url);
        return Err(ReleaseError::UnexpectedStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::{Value, json};

    fn client() -> HttpClient {
        HttpClient::new(DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn get_json_sends_headers_and_parses_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/crates/rand")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"crate": {"name": "rand"}}"#)
            .create_async()
            .await;

        let url = format!("{}/api/v1/crates/rand", server.url());
        let body: Value = client()
            .get_json(&url, &[("Accept", "application/json")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body["crate"]["name"], "rand");
    }

    #[tokio::test]
    async fn get_text_returns_not_found_for_404_and_410() {
        let mut server = Server::new_async().await;
        let missing = server.mock("GET", "/missing").with_status(404).create_async().await;
        let gone = server.mock("GET", "/gone").with_status(410).create_async().await;

        let missing_result = client().get_text(&format!("{}/missing", server.url()), &[]).await;
        let gone_result = client().get_text(&format!("{}/gone", server.url()), &[]).await;

        missing.assert_async().await;
        gone.assert_async().await;
        assert!(matches!(missing_result, Err(ReleaseError::NotFound(_))));
        assert!(matches!(gone_result, Err(ReleaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_text_returns_rate_limited_for_429() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "60")
            .create_async()
            .await;

        let result = client().get_text(&format!("{}/limited", server.url()), &[]).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(ReleaseError::RateLimited {
                retry_after_secs: Some(60)
            })
        ));
    }

    #[tokio::test]
    async fn get_bytes_returns_unexpected_status_for_server_error() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", "/broken").with_status(503).create_async().await;

        let result = client().get_bytes(&format!("{}/broken", server.url()), &[]).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(ReleaseError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn post_json_returns_invalid_credential_for_401() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(401)
            .with_body(r#"{"message": "Bad credentials"}"#)
            .create_async()
            .await;

        let result: Result<Value, _> = client()
            .post_json(&format!("{}/graphql", server.url()), &[], &json!({"query": "{}"}))
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ReleaseError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn get_json_returns_invalid_response_for_malformed_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let result: Result<Value, _> = client()
            .get_json(&format!("{}/garbage", server.url()), &[])
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ReleaseError::InvalidResponse(_))));
    }
}
