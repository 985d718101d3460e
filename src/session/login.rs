// Login flow: request, response interpretation, token expiry

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{info, warn};

use super::{Credential, SessionContext};
use crate::api::AuthApi;
use crate::models::{LoginRequest, LoginResponse};
use crate::types::{AppError, AppResult};

/// Log in and establish the session on success. The session is left
/// unauthenticated (or untouched, if one was live) on any failure.
pub async fn login(
    api: &dyn AuthApi,
    session: &SessionContext,
    identity: &str,
    secret: &str,
) -> AppResult<Credential> {
    let identity = identity.trim();
    if identity.is_empty() || secret.is_empty() {
        return Err(AppError::InvalidRequest(
            "Email and password are required".to_string(),
        ));
    }

    session.begin_login();
    let request = LoginRequest {
        email: identity.to_string(),
        password: secret.to_string(),
    };

    let result = api
        .login(&request)
        .await
        .and_then(|response| credential_from_response(identity, response));

    match result {
        Ok(credential) => {
            session.establish(credential.clone());
            Ok(credential)
        }
        Err(e) => {
            warn!(identity = %identity, error = %e, "Login failed");
            session.fail_login();
            Err(e)
        }
    }
}

/// Build a credential from either login response shape.
///
/// The identity is the user's email (or username) when the response
/// carries one, otherwise the identity that was used to log in.
pub fn credential_from_response(identity: &str, response: LoginResponse) -> AppResult<Credential> {
    let grant = response.into_grant();
    if grant.access_token.trim().is_empty() {
        return Err(AppError::MalformedLogin("empty access token".to_string()));
    }

    let profile = grant.user.filter(|u| !u.is_null());
    let identity = profile
        .as_ref()
        .and_then(|u| {
            ["email", "username", "name"]
                .iter()
                .find_map(|key| u.get(*key).and_then(|v| v.as_str()))
        })
        .unwrap_or(identity)
        .to_string();

    let expires_at = token_expiry(&grant.access_token);
    info!(identity = %identity, expires_at = ?expires_at, "Login accepted");

    Ok(Credential {
        identity,
        token: grant.access_token,
        profile,
        expires_at,
    })
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// `exp` of a JWT bearer token. The signature is not checked: the client
/// only needs to know when to stop using the token. Opaque tokens yield
/// `None`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(data.claims.exp?, 0)
}
