use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
}

/// External collaborator resolving bearer tokens to user identities.
///
/// `Ok(None)` means the token is not recognized; the farm query path treats
/// that the same as an anonymous caller.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> anyhow::Result<Option<UserIdentity>>;
}

/// HTTP implementation against an identity service exposing
/// `GET /auth/v1/user` with a bearer token.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, token: &str) -> anyhow::Result<Option<UserIdentity>> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));
        let res = self.http.get(&url).bearer_auth(token).send().await?;

        match res.status() {
            status if status.is_success() => {
                let user: UserResponse = res.json().await?;
                Ok(Some(UserIdentity { id: user.id }))
            }
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Ok(None),
            status => anyhow::bail!("identity service error: status {status}"),
        }
    }
}
