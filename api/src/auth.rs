use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use meteotrip_core::auth::{API_KEY_PREFIX, hash_token, looks_like_api_key};
use meteotrip_core::quota::Identity;
use tower::{Layer, Service, ServiceExt};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Registered traveler resolved from `Authorization: Bearer mt_sk_...`.
///
/// Two-phase resolution:
/// 1. `InjectAuthLayer` validates the key and stores the user in request extensions
/// 2. The extractor reads it from extensions, or authenticates itself if the layer did not run
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub key_id: Uuid,
}

/// Whoever is calling: registered when a valid key is presented, anonymous
/// when no `Authorization` header is sent at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Identity);

// --- Tower Layer/Service for auth injection ---

/// Tower Layer that injects `AuthenticatedUser` into request extensions.
/// Silently continues on auth failure so anonymous routes keep working.
#[derive(Clone)]
pub struct InjectAuthLayer {
    pool: sqlx::PgPool,
}

impl InjectAuthLayer {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

impl<S> Layer<S> for InjectAuthLayer {
    type Service = InjectAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InjectAuthService {
            inner,
            pool: self.pool.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InjectAuthService<S> {
    inner: S,
    pool: sqlx::PgPool,
}

impl<S> Service<Request> for InjectAuthService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let not_ready = self.inner.clone();
        let ready = std::mem::replace(&mut self.inner, not_ready);
        let pool = self.pool.clone();

        // Headers are Send-safe, the body is not
        let token = extract_bearer_token(&req);

        Box::pin(async move {
            if let Some(token) = token.filter(|t| looks_like_api_key(t)) {
                if let Ok(user) = authenticate_api_key(&token, &pool).await {
                    req.extensions_mut().insert(user);
                }
            }
            Ok(ready.oneshot(req).await.into_response())
        })
    }
}

fn extract_bearer_token(req: &Request) -> Option<String> {
    let auth_header = req.headers().get("authorization")?.to_str().ok()?;
    auth_header.strip_prefix("Bearer ").map(|s| s.to_owned())
}

// --- Extractors (used by handlers) ---

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
                docs_hint: Some(format!(
                    "Include 'Authorization: Bearer <key>' with an API key ({API_KEY_PREFIX}...). \
                     Create one with 'meteotrip admin create-key'."
                )),
                next_action: None,
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authorization header must use Bearer scheme".to_string(),
                docs_hint: Some("Format: 'Authorization: Bearer <key>'".to_string()),
                next_action: None,
            })?;

        if !looks_like_api_key(token) {
            return Err(AppError::Unauthorized {
                message: "Invalid token format".to_string(),
                docs_hint: Some(format!("API keys start with '{API_KEY_PREFIX}'.")),
                next_action: None,
            });
        }

        authenticate_api_key(token, &state.db).await
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key("authorization")
            && parts.extensions.get::<AuthenticatedUser>().is_none()
        {
            return Ok(Caller(Identity::Anonymous));
        }
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        Ok(Caller(Identity::Registered {
            user_id: user.user_id,
        }))
    }
}

async fn authenticate_api_key(
    token: &str,
    pool: &sqlx::PgPool,
) -> Result<AuthenticatedUser, AppError> {
    let token_hash = hash_token(token);

    let row = sqlx::query_as::<_, ApiKeyRow>(
        "SELECT ak.id, ak.user_id, ak.expires_at \
         FROM api_keys ak \
         JOIN users u ON u.id = ak.user_id \
         WHERE ak.key_hash = $1 \
           AND ak.is_revoked = FALSE \
           AND u.is_active = TRUE",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::Unauthorized {
        message: "Invalid API key".to_string(),
        docs_hint: Some("Check that the API key is correct and has not been revoked.".to_string()),
        next_action: None,
    })?;

    if let Some(expires_at) = row.expires_at {
        if Utc::now() > expires_at {
            return Err(AppError::Unauthorized {
                message: "API key has expired".to_string(),
                docs_hint: Some("Create a new API key with 'meteotrip admin create-key'.".to_string()),
                next_action: None,
            });
        }
    }

    // Fire-and-forget last_used_at update
    let pool_clone = pool.clone();
    let key_id = row.id;
    tokio::spawn(async move {
        let _ = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(key_id)
            .execute(&pool_clone)
            .await;
    });

    Ok(AuthenticatedUser {
        user_id: row.user_id,
        key_id: row.id,
    })
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    user_id: Uuid,
    expires_at: Option<chrono::DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;

    use super::*;
    use crate::state::test_support;

    async fn whoami(Caller(identity): Caller) -> String {
        match identity {
            Identity::Anonymous => "anonymous".to_string(),
            Identity::Registered { user_id } => user_id.to_string(),
        }
    }

    async fn private(user: AuthenticatedUser) -> String {
        user.user_id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/private", get(private))
            .with_state(test_support::state(None))
    }

    async fn send(request: Request<Body>) -> (StatusCode, String) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn no_header_is_anonymous() {
        let (status, body) = send(Request::get("/whoami").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn injected_user_is_registered() {
        let user_id = Uuid::now_v7();
        let request = Request::get("/whoami")
            .extension(AuthenticatedUser {
                user_id,
                key_id: Uuid::now_v7(),
            })
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, user_id.to_string());
    }

    #[tokio::test]
    async fn private_route_requires_a_key() {
        let (status, body) = send(Request::get("/private").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Missing Authorization header"));
    }

    #[tokio::test]
    async fn malformed_credentials_are_rejected_without_lookup() {
        for header in ["Basic abc", "Bearer not-a-key"] {
            let request = Request::get("/whoami")
                .header("authorization", header)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "header: {header}");
            assert!(body.contains("unauthorized"));
        }
    }
}
