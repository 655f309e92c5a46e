use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    pub email: Option<String>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
    }
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

/// Verifies an HS256 bearer token from an `Authorization` header value.
pub fn claims_from_header(header: Option<&str>, secret: &str) -> Result<Claims, Response> {
    let Some(auth_str) = header else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            reject(StatusCode::UNAUTHORIZED, "invalid_token")
        })
}

fn request_claims(req: &Request) -> Result<Claims, Response> {
    let header = match req.headers().get(axum::http::header::AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(s) => Some(s),
            Err(_) => return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization")),
        },
        None => None,
    };
    let config = crate::config::get_config();
    claims_from_header(header, &config.jwt_secret)
}

pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    match request_claims(&req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

pub async fn require_admin(mut req: Request, next: Next) -> Response {
    match request_claims(&req) {
        Ok(claims) if claims.is_admin() => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Ok(claims) => {
            tracing::warn!(user_id = %claims.sub, "Non-admin attempted an admin route");
            reject(StatusCode::FORBIDDEN, "forbidden")
        }
        Err(resp) => resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: Option<&str>, exp: usize, secret: &str) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            exp,
            role: role.map(str::to_string),
            email: Some("user1@example.com".into()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn valid_token_yields_claims() {
        let header = format!("Bearer {}", token(Some("Admin"), far_future(), "s3cret"));
        let claims = claims_from_header(Some(&header), "s3cret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("user1@example.com"));
        assert!(claims.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = format!("Bearer {}", token(None, far_future(), "s3cret"));
        let resp = claims_from_header(Some(&header), "other").unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        let header = format!("Bearer {}", token(None, 1_000, "s3cret"));
        assert!(claims_from_header(Some(&header), "s3cret").is_err());
    }

    #[test]
    fn missing_or_foreign_scheme_is_rejected() {
        assert!(claims_from_header(None, "s3cret").is_err());
        assert!(claims_from_header(Some("Basic abc"), "s3cret").is_err());
    }

    #[test]
    fn roles_other_than_admin_are_not_admin() {
        let claims = Claims {
            sub: "x".into(),
            exp: 0,
            role: Some("student".into()),
            email: None,
        };
        assert!(!claims.is_admin());
    }
}
