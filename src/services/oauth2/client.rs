use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::OAuth2Error;

/// Body of a successful token endpoint response.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .finish()
    }
}

/// Client credentials and endpoint for one exchange, taken from the state token.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    pub token_endpoint: &'a str,
    pub redirect_uri: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub audience: &'a str,
}

/// Back channel to a provider's token endpoint.
#[async_trait]
pub trait TokenExchangeClient: Send + Sync {
    /// `grant_type=authorization_code`.
    async fn exchange_code(&self, req: &ExchangeRequest<'_>, code: &str) -> Result<TokenResponse, OAuth2Error>;

    /// `grant_type=refresh_token`.
    async fn refresh(&self, req: &ExchangeRequest<'_>, refresh_token: &str) -> Result<TokenResponse, OAuth2Error>;
}

pub struct ReqwestTokenClient {
    client: reqwest::Client,
}

impl ReqwestTokenClient {
    /// `timeout` applies to connect, each read, and the whole request.
    pub fn new(timeout: Duration) -> Result<Self, OAuth2Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OAuth2Error::configuration("HTTP_CLIENT", "failed to build OAuth2 HTTP client").with_source(e)
            })?;
        Ok(Self { client })
    }

    async fn post_form(
        &self,
        req: &ExchangeRequest<'_>,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, OAuth2Error> {
        debug!(endpoint = req.token_endpoint, client_id = req.client_id, "calling token endpoint");

        let response = self
            .client
            .post(req.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let details = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            warn!(status = status.as_u16(), endpoint = req.token_endpoint, "token endpoint rejected the request");
            return Err(OAuth2Error::token_exchange(
                "TOKEN_EXCHANGE_REJECTED",
                format!("token endpoint answered {}", status.as_u16()),
            )
            .with_details(json!({ "status": status.as_u16(), "body": details })));
        }

        serde_json::from_str::<TokenResponse>(&body).map_err(|e| {
            OAuth2Error::token_exchange("INVALID_TOKEN_RESPONSE", "token endpoint returned an unexpected body")
                .with_source(e)
        })
    }
}

fn transport_error(e: reqwest::Error) -> OAuth2Error {
    if e.is_timeout() {
        OAuth2Error::token_exchange("TOKEN_EXCHANGE_TIMEOUT", "token endpoint did not answer in time").with_source(e)
    } else {
        OAuth2Error::token_exchange("TOKEN_EXCHANGE_FAILED", "token endpoint unreachable").with_source(e)
    }
}

#[async_trait]
impl TokenExchangeClient for ReqwestTokenClient {
    async fn exchange_code(&self, req: &ExchangeRequest<'_>, code: &str) -> Result<TokenResponse, OAuth2Error> {
        self.post_form(
            req,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", req.redirect_uri),
                ("audience", req.audience),
                ("client_id", req.client_id),
                ("client_secret", req.client_secret),
            ],
        )
        .await
    }

    async fn refresh(&self, req: &ExchangeRequest<'_>, refresh_token: &str) -> Result<TokenResponse, OAuth2Error> {
        self.post_form(
            req,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("redirect_uri", req.redirect_uri),
                ("audience", req.audience),
                ("client_id", req.client_id),
                ("client_secret", req.client_secret),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuth2ErrorKind;
    use mockito::{Matcher, Server};

    fn request<'a>(endpoint: &'a str) -> ExchangeRequest<'a> {
        ExchangeRequest {
            token_endpoint: endpoint,
            redirect_uri: "https://app/cb",
            client_id: "cid",
            client_secret: "csecret",
            audience: "https://api",
        }
    }

    #[tokio::test]
    async fn exchange_posts_form_and_parses_tokens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "https://app/cb".into()),
                Matcher::UrlEncoded("audience".into(), "https://api".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "csecret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at","refresh_token":"rt","id_token":"a.b.c","token_type":"Bearer"}"#)
            .create_async()
            .await;

        let endpoint = format!("{}/oauth/token", server.url());
        let client = ReqwestTokenClient::new(Duration::from_secs(5)).unwrap();
        let tokens = client.exchange_code(&request(&endpoint), "the-code").await.unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.id_token.as_deref(), Some("a.b.c"));
    }

    #[tokio::test]
    async fn refresh_uses_refresh_grant() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "rt".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"at2"}"#)
            .create_async()
            .await;

        let endpoint = format!("{}/oauth/token", server.url());
        let client = ReqwestTokenClient::new(Duration::from_secs(5)).unwrap();
        let tokens = client.refresh(&request(&endpoint), "rt").await.unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.access_token, "at2");
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[tokio::test]
    async fn provider_rejection_carries_details() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(403)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let endpoint = format!("{}/oauth/token", server.url());
        let client = ReqwestTokenClient::new(Duration::from_secs(5)).unwrap();
        let err = client.exchange_code(&request(&endpoint), "bad").await.unwrap_err();

        assert_eq!(err.kind, OAuth2ErrorKind::TokenExchange);
        assert_eq!(err.code, "TOKEN_EXCHANGE_REJECTED");
        let details = err.details.unwrap();
        assert_eq!(details["status"], 403);
        assert_eq!(details["body"]["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn unexpected_body_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let endpoint = format!("{}/oauth/token", server.url());
        let client = ReqwestTokenClient::new(Duration::from_secs(5)).unwrap();
        let err = client.exchange_code(&request(&endpoint), "c").await.unwrap_err();
        assert_eq!(err.code, "INVALID_TOKEN_RESPONSE");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_token_exchange_error() {
        let client = ReqwestTokenClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .exchange_code(&request("http://127.0.0.1:9/oauth/token"), "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind, OAuth2ErrorKind::TokenExchange);
    }
}
