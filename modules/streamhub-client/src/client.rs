//! The HTTP gateway.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use streamhub_common::{Config, ErrorBody, JwtDto};

use crate::error::{ClientError, Result};
use crate::refresh::{GateTicket, RefreshFailed, RefreshGate};
use crate::session::AuthSession;

pub(crate) const REFRESH_PATH: &str = "/api/auth/refresh";
const AUTH_PREFIX: &str = "/api/auth/";
const CSRF_COOKIE: &str = "XSRF-TOKEN";
const CSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Body attached to an outbound request. Held as owned values so a request
/// can be rebuilt for the post-refresh retry.
pub(crate) enum Payload {
    Json(Value),
    Form(Vec<(String, String)>),
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    jar: Arc<Jar>,
    session: AuthSession,
    gate: RefreshGate,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        // The jar carries the http-only refresh-token cookie and the
        // anti-forgery cookie the server sets.
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .cookie_provider(jar.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            jar,
            session: AuthSession::new(),
            gate: RefreshGate::new(),
        })
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(Method::GET, path, None, None).await?;
        Self::into_json(response).await
    }

    pub async fn get_with_query<Q: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let query = serde_json::to_value(query)?;
        let response = self.execute(Method::GET, path, Some(query), None).await?;
        Self::into_json(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = Payload::Json(serde_json::to_value(body)?);
        let response = self.execute(Method::POST, path, None, Some(body)).await?;
        Self::into_json(response).await
    }

    /// POST with no request or response body.
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        self.execute(Method::POST, path, None, None).await?;
        Ok(())
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = Payload::Json(serde_json::to_value(body)?);
        let response = self.execute(Method::PATCH, path, None, Some(body)).await?;
        Self::into_json(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(Method::DELETE, path, None, None).await?;
        Ok(())
    }

    /// GET where only the side effects (cookies) matter.
    pub(crate) async fn get_ignore_body(&self, path: &str) -> Result<()> {
        self.execute(Method::GET, path, None, None).await?;
        Ok(())
    }

    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Vec<(String, String)>,
    ) -> Result<T> {
        let response = self
            .execute(Method::POST, path, None, Some(Payload::Form(form)))
            .await?;
        Self::into_json(response).await
    }

    /// Send one request with credentials attached. On a 401 outside the auth
    /// endpoints the caller enters the refresh gate and the request is
    /// rebuilt and retried exactly once with the refreshed credential.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<Value>,
        body: Option<Payload>,
    ) -> Result<reqwest::Response> {
        let mut retried = false;
        loop {
            let mut request = self
                .http
                .request(method.clone(), format!("{}{}", self.base_url, path));
            if let Some(query) = &query {
                request = request.query(query);
            }
            match &body {
                Some(Payload::Json(json)) => request = request.json(json),
                Some(Payload::Form(form)) => request = request.form(form),
                None => {}
            }
            // The refresh endpoint authenticates with its cookie, not the
            // (possibly expired) bearer token.
            if path != REFRESH_PATH {
                if let Some(token) = self.session.access_token() {
                    request = request.bearer_auth(token);
                }
            }
            if !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS) {
                if let Some(csrf) = self.csrf_token() {
                    request = request.header(CSRF_HEADER, csrf);
                }
            }

            let response = request.send().await?;
            if response.status() == StatusCode::UNAUTHORIZED
                && !retried
                && !path.starts_with(AUTH_PREFIX)
            {
                tracing::debug!(%path, "authorization failure, entering refresh gate");
                retried = true;
                self.refresh_access_token().await?;
                continue;
            }
            return Self::ok_or_api_error(response).await;
        }
    }

    /// Refresh the access token through the single-flight gate. Concurrent
    /// callers share one refresh call; a failed refresh clears the queue,
    /// signs the session out and propagates the failure.
    pub async fn refresh_access_token(&self) -> Result<String> {
        match self.gate.begin() {
            GateTicket::Leader(lease) => {
                tracing::info!("refreshing access token");
                match self.call_refresh().await {
                    Ok(jwt) => {
                        let token = jwt.access_token.clone();
                        self.session.set(jwt);
                        lease.finish(Ok(token.clone()));
                        Ok(token)
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "token refresh failed, signing out");
                        lease.finish(Err(RefreshFailed(error.to_string())));
                        self.session.clear();
                        Err(error)
                    }
                }
            }
            GateTicket::Follower(outcome) => match outcome.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(failed)) => Err(ClientError::Auth(failed.to_string())),
                Err(_) => Err(ClientError::Auth("refresh abandoned".to_string())),
            },
        }
    }

    /// The raw refresh call. Bypasses `execute` so it can never re-enter the
    /// gate; the refresh-token cookie in the jar authenticates it.
    async fn call_refresh(&self) -> Result<JwtDto> {
        let mut request = self.http.post(format!("{}{}", self.base_url, REFRESH_PATH));
        if let Some(csrf) = self.csrf_token() {
            request = request.header(CSRF_HEADER, csrf);
        }
        let response = Self::ok_or_api_error(request.send().await?).await?;
        Self::into_json(response).await
    }

    /// Read the anti-forgery token the server left in its cookie.
    pub(crate) fn csrf_token(&self) -> Option<String> {
        let url = Url::parse(&self.base_url).ok()?;
        let header = self.jar.cookies(&url)?;
        let cookies = header.to_str().ok()?;
        cookies.split("; ").find_map(|pair| {
            pair.strip_prefix(CSRF_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.to_string())
        })
    }

    async fn ok_or_api_error(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // Prefer the server's standardized error envelope; fall back to the
        // raw body text.
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|envelope| envelope.message)
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn into_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        Ok(response.json().await?)
    }
}
