//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.
//!
//! Authentication happens upstream; this layer only reads the identity headers
//! the gateway forwards and hands them to the handlers.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use doubt_forum_core::{Participant, Role, Viewer};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const DEFAULT_NAME: &str = "Student";

/// The caller of a request, as forwarded by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn participant(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.user_id.clone(),
            role: self.role,
        }
    }

    pub fn is_professor(&self) -> bool {
        self.role == Role::Professor
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, (StatusCode, String)> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                format!("{} header is required", USER_ID_HEADER),
            )
        })?;
        let name = header(USER_NAME_HEADER).unwrap_or(DEFAULT_NAME);
        let role = match header(USER_ROLE_HEADER) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
            None => Role::Student,
        };

        Ok(Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            role,
        })
    }
}

/// Middleware that extracts the caller's identity from the request headers.
///
/// If present, inserts an `Identity` into request extensions for handlers to use.
/// A missing user id returns 401 Unauthorized; an unknown role returns 400.
pub async fn require_identity(
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let identity = Identity::from_headers(req.headers())?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn defaults_name_and_role() {
        let identity = Identity::from_headers(&headers(&[(USER_ID_HEADER, "u-7")])).unwrap();
        assert_eq!(identity.user_id, "u-7");
        assert_eq!(identity.name, "Student");
        assert_eq!(identity.role, Role::Student);
    }

    #[test]
    fn reads_role_case_insensitively() {
        let identity = Identity::from_headers(&headers(&[
            (USER_ID_HEADER, "p-1"),
            (USER_NAME_HEADER, "Dr. Rao"),
            (USER_ROLE_HEADER, "Professor"),
        ]))
        .unwrap();
        assert!(identity.is_professor());
        assert_eq!(identity.participant().name, "Dr. Rao");
    }

    #[test]
    fn rejects_missing_id_and_unknown_role() {
        let (status, _) = Identity::from_headers(&headers(&[(USER_ROLE_HEADER, "senior")]))
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = Identity::from_headers(&headers(&[
            (USER_ID_HEADER, "u-1"),
            (USER_ROLE_HEADER, "dean"),
        ]))
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
