//! Caller identity as forwarded by the upstream gateway.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::domain::{Actor, Role, UserId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityRejection {
    #[error("missing {0} header")]
    Missing(&'static str),
    #[error("invalid {0} header")]
    Invalid(&'static str),
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?
            .parse::<u64>()
            .map_err(|_| IdentityRejection::Invalid(USER_ID_HEADER))?;
        let role = Role::parse(header(parts, USER_ROLE_HEADER)?)
            .ok_or(IdentityRejection::Invalid(USER_ROLE_HEADER))?;
        Ok(Actor {
            id: UserId(id),
            role,
        })
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, IdentityRejection> {
    let value = parts
        .headers
        .get(name)
        .ok_or(IdentityRejection::Missing(name))?;
    value
        .to_str()
        .map(str::trim)
        .map_err(|_| IdentityRejection::Invalid(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, IdentityRejection> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_id_and_role_headers() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "42")
            .header(USER_ROLE_HEADER, "Professional")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, Ok(Actor::professional(42)));
    }

    #[tokio::test]
    async fn rejects_missing_or_unknown_role() {
        let missing = Request::builder()
            .header(USER_ID_HEADER, "42")
            .body(())
            .unwrap();
        assert_eq!(
            extract(missing).await,
            Err(IdentityRejection::Missing(USER_ROLE_HEADER))
        );

        let unknown = Request::builder()
            .header(USER_ID_HEADER, "42")
            .header(USER_ROLE_HEADER, "nurse")
            .body(())
            .unwrap();
        let rejection = extract(unknown).await.unwrap_err();
        assert_eq!(rejection, IdentityRejection::Invalid(USER_ROLE_HEADER));
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
