//! Bearer-token verification for the operator surfaces.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::ServiceError;

/// Identity attached to a request once its bearer token has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Stable account identifier, used as the owner of created games.
    pub id: String,
    /// Account e-mail when the identity provider reports one.
    pub email: Option<String>,
}

/// Verifies bearer tokens presented by operators.
pub trait Authenticator: Send + Sync {
    /// Resolve the operator behind `token`, or reject it as [`ServiceError::Unauthorized`].
    fn authenticate(&self, token: &str) -> BoxFuture<'static, Result<AuthenticatedUser, ServiceError>>;
}

/// Accepts a single shared secret configured through `ADMIN_TOKEN`.
///
/// Without a configured secret every request is rejected.
#[derive(Clone, Default)]
pub struct StaticTokenAuthenticator {
    token: Option<Arc<str>>,
}

impl StaticTokenAuthenticator {
    /// Operator identity reported for requests carrying the shared secret.
    pub const OPERATOR_ID: &'static str = "operator";

    /// Wrap the shared secret; a blank secret counts as none.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .filter(|token| !token.trim().is_empty())
                .map(Arc::from),
        }
    }

    /// Whether a secret is configured at all.
    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> BoxFuture<'static, Result<AuthenticatedUser, ServiceError>> {
        let result = match self.token {
            Some(ref expected) if tokens_match(expected, token) => Ok(AuthenticatedUser {
                id: Self::OPERATOR_ID.into(),
                email: None,
            }),
            Some(_) => Err(ServiceError::Unauthorized("invalid token".into())),
            None => Err(ServiceError::Unauthorized(
                "no operator token configured".into(),
            )),
        };
        Box::pin(async move { result })
    }
}

/// Compare secrets in time independent of where they first differ.
fn tokens_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(feature = "supabase-store")]
pub use self::supabase::SupabaseAuthenticator;

#[cfg(feature = "supabase-store")]
mod supabase {
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use reqwest::{Client, StatusCode};
    use tracing::warn;

    use super::{AuthenticatedUser, Authenticator, SupabaseUser};
    use crate::{
        dao::{score_store::supabase::SupabaseConfig, storage::StorageError},
        error::ServiceError,
    };

    /// Validates access tokens against the Supabase auth API (`GET /auth/v1/user`).
    #[derive(Clone)]
    pub struct SupabaseAuthenticator {
        client: Client,
        user_url: Arc<str>,
        api_key: Arc<str>,
    }

    impl SupabaseAuthenticator {
        /// Point the verifier at the auth API of the configured project.
        pub fn new(config: &SupabaseConfig) -> Self {
            Self {
                client: Client::new(),
                user_url: Arc::from(format!("{}/auth/v1/user", config.trimmed_url())),
                api_key: Arc::from(config.api_key.as_str()),
            }
        }
    }

    impl Authenticator for SupabaseAuthenticator {
        fn authenticate(
            &self,
            token: &str,
        ) -> BoxFuture<'static, Result<AuthenticatedUser, ServiceError>> {
            let auth = self.clone();
            let token = token.to_string();
            Box::pin(async move {
                let response = auth
                    .client
                    .get(auth.user_url.as_ref())
                    .header("apikey", auth.api_key.as_ref())
                    .bearer_auth(&token)
                    .send()
                    .await
                    .map_err(|source| {
                        warn!(error = %source, "auth endpoint unreachable");
                        ServiceError::Unavailable(StorageError::unavailable(
                            "auth endpoint unreachable".into(),
                            source,
                        ))
                    })?;

                match response.status() {
                    status if status.is_success() => {
                        let user = response.json::<SupabaseUser>().await.map_err(|source| {
                            ServiceError::Unavailable(StorageError::unavailable(
                                "invalid auth response".into(),
                                source,
                            ))
                        })?;
                        Ok(user.into())
                    }
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        Err(ServiceError::Unauthorized("invalid or expired token".into()))
                    }
                    other => {
                        warn!(status = %other, "unexpected auth response");
                        Err(ServiceError::Unauthorized(format!(
                            "token rejected ({other})"
                        )))
                    }
                }
            })
        }
    }
}

#[cfg_attr(not(feature = "supabase-store"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<SupabaseUser> for AuthenticatedUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
