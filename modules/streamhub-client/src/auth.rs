//! Authentication calls layered on the gateway.

use streamhub_common::JwtDto;

use crate::client::ApiClient;
use crate::error::Result;

impl ApiClient {
    /// Sign in with username/password. The endpoint takes a form-urlencoded
    /// body; the refresh-token cookie arrives alongside the JSON token pair.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<JwtDto> {
        let form = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        let jwt: JwtDto = self.post_form("/api/auth/sign-in", form).await?;
        self.session().set(jwt.clone());
        tracing::info!(user = %jwt.user.username, "signed in");
        Ok(jwt)
    }

    /// Sign out server-side, drop the local session and re-prime the
    /// anti-forgery cookie for the anonymous session.
    pub async fn sign_out(&self) -> Result<()> {
        self.post_empty("/api/auth/sign-out").await?;
        self.session().clear();
        self.fetch_csrf_token().await?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Prime the anti-forgery cookie. The server sets it as a side effect;
    /// the response body is empty.
    pub async fn fetch_csrf_token(&self) -> Result<()> {
        self.get_ignore_body("/api/auth/csrf-token").await
    }
}
