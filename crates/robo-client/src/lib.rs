//! Client for the Robot dedicated-server management API.
//!
//! [`RobotApi`] is the seam the dispatcher talks to; [`RobotClient`] is the
//! reqwest implementation. Every call is a single authenticated attempt with
//! no retry. Any transport failure, non-2xx status, or undecodable body comes
//! back as a [`RemoteError`].

#![forbid(unsafe_code)]

use async_trait::async_trait;
use reqwest::Client;
use robo_proto::{
    ApiErrorEnvelope, ResetDescriptor, ResetEnvelope, ResetOptionsEnvelope, ResetOutcome,
    ResetRequest, ServerEnvelope, ServerRecord,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Production Robot web service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://robot-ws.your-server.de";

const USER_AGENT: &str = concat!("robobot/", env!("CARGO_PKG_VERSION"));

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response carrying the API's error envelope.
    #[error("API error {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Non-2xx response without a recognisable error body.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

// ─── Trait ────────────────────────────────────────────────────────────────────

/// The three remote operations the bot needs.
#[async_trait]
pub trait RobotApi: Send + Sync {
    /// `GET /server`
    async fn list_servers(&self) -> RemoteResult<Vec<ServerRecord>>;

    /// `GET /reset/{server_ip}`
    async fn reset_options(&self, server_ip: &str) -> RemoteResult<ResetDescriptor>;

    /// `POST /reset/{server_ip}` with `type=<reset_type>`.
    ///
    /// The reset may already have happened on the remote side when this
    /// returns [`RemoteError::Decode`].
    async fn execute_reset(&self, server_ip: &str, reset_type: &str)
    -> RemoteResult<ResetOutcome>;
}

// ─── Credentials ──────────────────────────────────────────────────────────────

/// Basic-auth credentials for the Robot web service.
#[derive(Clone)]
pub struct RobotCredentials {
    pub user: String,
    pub password: String,
}

impl RobotCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for RobotCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RobotClient {
    client: Client,
    base_url: String,
    credentials: RobotCredentials,
}

impl RobotClient {
    /// Build a client against `base_url` (no trailing slash needed).
    pub fn new(credentials: RobotCredentials, base_url: impl Into<String>) -> RemoteResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .send()
            .await?;

        let (_, body) = handle_response(path, response).await?;
        Ok(body)
    }

    async fn post_form<T, B>(&self, path: &str, form: &B) -> RemoteResult<(String, T)>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "POST request (form)");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .form(form)
            .send()
            .await?;

        handle_response(path, response).await
    }
}

/// Return the status line and decoded body of a 2xx response, or the
/// matching [`RemoteError`].
async fn handle_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> RemoteResult<(String, T)> {
    let status = response.status();
    let status_line = status.to_string();
    let text = response.text().await?;

    if !status.is_success() {
        warn!(path, status = status.as_u16(), "Robot API returned error status");
        return Err(match serde_json::from_str::<ApiErrorEnvelope>(&text) {
            Ok(env) => RemoteError::Api {
                status: env.error.status,
                code: env.error.code,
                message: env.error.message,
            },
            Err(_) => RemoteError::Status {
                status: status.as_u16(),
                body: text,
            },
        });
    }

    let body = serde_json::from_str(&text).map_err(|e| {
        warn!(path, error = %e, body = %text, "failed to parse Robot API response");
        RemoteError::Decode {
            path: path.to_string(),
            source: e,
        }
    })?;
    Ok((status_line, body))
}

#[async_trait]
impl RobotApi for RobotClient {
    async fn list_servers(&self) -> RemoteResult<Vec<ServerRecord>> {
        let servers: Vec<ServerEnvelope> = self.get("/server").await?;
        debug!(count = servers.len(), "listed servers");
        Ok(servers.into_iter().map(|e| e.server).collect())
    }

    async fn reset_options(&self, server_ip: &str) -> RemoteResult<ResetDescriptor> {
        let env: ResetOptionsEnvelope = self.get(&format!("/reset/{server_ip}")).await?;
        Ok(env.reset)
    }

    async fn execute_reset(
        &self,
        server_ip: &str,
        reset_type: &str,
    ) -> RemoteResult<ResetOutcome> {
        info!(server_ip, reset_type, "executing reset");
        let (status, env): (String, ResetEnvelope) = self
            .post_form(&format!("/reset/{server_ip}"), &ResetRequest { reset_type })
            .await?;
        Ok(ResetOutcome {
            status,
            reset: env.reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RobotClient {
        RobotClient::new(RobotCredentials::new("robot-user", "s3cret"), server.uri())
            .expect("client")
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = RobotCredentials::new("robot-user", "s3cret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("robot-user"));
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let c = RobotClient::new(RobotCredentials::new("u", "p"), "https://robot.example/")
            .expect("client");
        assert_eq!(c.base_url(), "https://robot.example");
    }

    #[tokio::test]
    async fn test_list_servers_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .and(basic_auth("robot-user", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[{"server":{"server_ip":"10.0.0.1","server_number":1,"server_name":"alpha",
                    "product":"EX44","dc":"FSN1-DC1","traffic":"unlimited","flatrate":true,
                    "status":"ready","throttled":false,"cancelled":false,"paid_until":"2031-01-01",
                    "ip":["10.0.0.1"],"subnet":null}}]"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let servers = client(&server).list_servers().await.expect("list");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].server_name, "alpha");
    }

    #[tokio::test]
    async fn test_reset_options_decodes_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reset/10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"reset":{"server_ip":"10.0.0.1","server_number":1,
                    "type":["sw","hw","man"],"operating_status":"not supported"}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let desc = client(&server).reset_options("10.0.0.1").await.expect("options");
        assert_eq!(desc.server_ip, "10.0.0.1");
        assert_eq!(desc.reset_types, vec!["sw", "hw", "man"]);
    }

    #[tokio::test]
    async fn test_execute_reset_posts_form_and_captures_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset/10.0.0.1"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("type=hw"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"reset":{"server_ip":"10.0.0.1","type":"hw"}}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .execute_reset("10.0.0.1", "hw")
            .await
            .expect("reset");
        assert_eq!(outcome.status, "200 OK");
        assert_eq!(outcome.reset.reset_type, "hw");
    }

    #[tokio::test]
    async fn test_execute_reset_undecodable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset/10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .execute_reset("10.0.0.1", "sw")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode { ref path, .. } if path == "/reset/10.0.0.1"));
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reset/10.9.9.9"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                r#"{"error":{"status":404,"code":"SERVER_NOT_FOUND","message":"Server not found"}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let err = client(&server).reset_options("10.9.9.9").await.unwrap_err();
        match err {
            RemoteError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "SERVER_NOT_FOUND");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).list_servers().await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        let c = RobotClient::new(RobotCredentials::new("u", "p"), "http://127.0.0.1:9")
            .expect("client");
        let err = c.list_servers().await.unwrap_err();
        assert!(matches!(err, RemoteError::Http(_)));
    }
}
