use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangeMobileRequest, ChangeNameRequest, ChangePasswordRequest, ForgotPasswordRequest,
            LoginRequest, RegisterRequest, ResetPasswordRequest,
        },
        extractors::{AuthUser, SESSION_COOKIE},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::User,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/change-name", put(change_name))
        .route("/change-mobile", put(change_mobile))
        .route("/change-password", put(change_password))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_valid_mobile(mobile: &str) -> bool {
    lazy_static! {
        static ref MOBILE_RE: Regex = Regex::new(r"^\d{10}$").unwrap();
    }
    MOBILE_RE.is_match(mobile)
}

fn session_cookie(token: &str, max_age_secs: u64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    Ok(HeaderValue::from_str(&cookie).map_err(anyhow::Error::new)?)
}

fn clear_session_cookie() -> Result<HeaderValue, ApiError> {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Ok(HeaderValue::from_str(&cookie).map_err(anyhow::Error::new)?)
}

fn build_reset_link(base: &str, token: &str) -> String {
    format!("{}?token={}", base.trim_end_matches('/'), token)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<&'static str, ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.mobile = payload.mobile.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.is_empty()
        || payload.mobile.is_empty()
        || payload.email.is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::Validation(
            "Name, mobile number, email, and password are required",
        ));
    }
    if !is_valid_mobile(&payload.mobile) {
        warn!("invalid mobile number");
        return Err(ApiError::Validation("Mobile number must be 10 digits"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email format"));
    }

    if User::find_by_mobile_or_email(&state.db, &payload.mobile, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "user already exists");
        return Err(ApiError::DuplicateUser);
    }

    // A racing insert can still lose to the unique constraints; that
    // surfaces as Conflict through the store error mapping.
    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.name,
        &payload.mobile,
        &payload.email,
        &hash,
    )
    .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok("User registered successfully")
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(HeaderMap, &'static str), ApiError> {
    payload.identifier = payload.identifier.trim().to_lowercase();

    if payload.identifier.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Email/Mobile number and password are required",
        ));
    }

    // An unknown identifier and a wrong password answer identically.
    let user = match User::find_by_identifier(&state.db, &payload.identifier).await? {
        Some(user) => user,
        None => {
            warn!("login unknown identifier");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id, user.role)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, keys.session_ttl.as_secs())?,
    );

    info!(user_id = user.id, "user logged in");
    Ok((headers, "Login successful"))
}

#[instrument]
pub async fn logout() -> Result<(HeaderMap, &'static str), ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie()?);
    Ok((headers, "Logout successful"))
}

#[instrument(skip(state, payload))]
pub async fn change_name(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(payload): Json<ChangeNameRequest>,
) -> Result<&'static str, ApiError> {
    // Empty names are allowed; the record just stores the empty string.
    let updated = User::update_name(&state.db, session.id, &payload.name).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("User"));
    }

    info!(user_id = session.id, "name updated");
    Ok("Name updated successfully")
}

#[instrument(skip(state, payload))]
pub async fn change_mobile(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(payload): Json<ChangeMobileRequest>,
) -> Result<&'static str, ApiError> {
    let mobile = payload.mobile.trim();
    if !is_valid_mobile(mobile) {
        warn!(user_id = session.id, "invalid mobile number");
        return Err(ApiError::Validation("Mobile number must be 10 digits"));
    }

    // No uniqueness pre-check; the store constraint rejects duplicates.
    User::update_mobile(&state.db, session.id, mobile).await?;

    info!(user_id = session.id, "mobile number updated");
    Ok("Mobile number updated successfully")
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<&'static str, ApiError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Old password and new password are required",
        ));
    }

    let user = User::find_by_id(&state.db, session.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !verify_password(&payload.old_password, &user.password_hash) {
        warn!(user_id = user.id, "change-password invalid old password");
        return Err(ApiError::InvalidCredentials);
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password_hash(&state.db, user.id, &hash).await?;

    info!(user_id = user.id, "password updated");
    Ok("Password updated successfully")
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<&'static str, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() {
        return Err(ApiError::Validation("Email is required"));
    }

    // Unlike login, this flow reveals whether the address is registered.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::NotFound("User with this email"))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_reset(user.id)?;
    let link = build_reset_link(&state.config.reset_link_base, &token);

    state
        .mailer
        .send(
            &user.email,
            "Password Reset Request",
            &format!("Click the following link to reset your password: {link}"),
        )
        .await?;

    info!(user_id = user.id, "password reset link sent");
    Ok("Password reset link has been sent to your email")
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<&'static str, ApiError> {
    if payload.token.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation("Token and new password are required"));
    }

    let keys = JwtKeys::from_ref(&state);
    let user_id = keys.verify_reset(&payload.token).map_err(|e| {
        warn!(error = %e, "reset token rejected");
        ApiError::InvalidToken
    })?;

    let hash = hash_password(&payload.new_password)?;
    User::update_password_hash(&state.db, user_id, &hash).await?;

    info!(user_id, "password reset");
    Ok("Password has been reset successfully")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::SessionUser;
    use crate::auth::repo_types::Role;

    fn fake_session() -> AuthUser {
        AuthUser(SessionUser {
            id: 1,
            role: Role::User,
        })
    }

    #[test]
    fn email_regex_accepts_basic_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("name.surname@dept.example.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@domain"));
        assert!(!is_valid_email("spaces in@x.com"));
    }

    #[test]
    fn mobile_regex_requires_exactly_ten_digits() {
        assert!(is_valid_mobile("9999999999"));
        assert!(!is_valid_mobile("123456789"));
        assert!(!is_valid_mobile("12345678901"));
        assert!(!is_valid_mobile("12345abcde"));
    }

    #[test]
    fn session_cookie_carries_the_expected_attributes() {
        let value = session_cookie("abc", 3600).expect("cookie");
        let value = value.to_str().expect("ascii");
        assert!(value.starts_with("token=abc;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=3600"));
    }

    #[test]
    fn reset_link_appends_the_token_query() {
        assert_eq!(
            build_reset_link("http://localhost:3000/reset-password/", "t0k"),
            "http://localhost:3000/reset-password?token=t0k"
        );
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                name: "A".into(),
                mobile: String::new(),
                email: "a@x.com".into(),
                password: "pw1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_mobile() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                name: "A".into(),
                mobile: "12345".into(),
                email: "a@x.com".into(),
                password: "pw1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation("Mobile number must be 10 digits")
        ));
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                name: "A".into(),
                mobile: "9999999999".into(),
                email: "not-an-email".into(),
                password: "pw1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation("Invalid email format")));
    }

    #[tokio::test]
    async fn login_requires_identifier_and_password() {
        let state = AppState::fake();
        let err = login(
            State(state),
            Json(LoginRequest {
                identifier: "a@x.com".into(),
                password: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let (headers, body) = logout().await.expect("logout never fails");
        assert_eq!(body, "Logout successful");
        let cookie = headers
            .get(header::SET_COOKIE)
            .expect("cookie header")
            .to_str()
            .expect("ascii");
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn change_mobile_rejects_bad_format() {
        let state = AppState::fake();
        let err = change_mobile(
            State(state),
            fake_session(),
            Json(ChangeMobileRequest {
                mobile: "12345".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation("Mobile number must be 10 digits")
        ));
    }

    #[tokio::test]
    async fn change_password_requires_both_fields() {
        let state = AppState::fake();
        let err = change_password(
            State(state),
            fake_session(),
            Json(ChangePasswordRequest {
                old_password: "pw1".into(),
                new_password: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn forgot_password_requires_email() {
        let state = AppState::fake();
        let err = forgot_password(
            State(state),
            Json(ForgotPasswordRequest {
                email: "   ".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation("Email is required")));
    }

    #[tokio::test]
    async fn reset_password_requires_token_and_password() {
        let state = AppState::fake();
        let err = reset_password(
            State(state),
            Json(ResetPasswordRequest {
                token: String::new(),
                new_password: "pw2".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_password_rejects_garbage_token() {
        let state = AppState::fake();
        let err = reset_password(
            State(state),
            Json(ResetPasswordRequest {
                token: "garbage".into(),
                new_password: "pw2".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn reset_password_rejects_foreign_signature() {
        use jsonwebtoken::{DecodingKey, EncodingKey};

        let state = AppState::fake();
        let foreign = JwtKeys {
            encoding: EncodingKey::from_secret(b"other-secret"),
            decoding: DecodingKey::from_secret(b"other-secret"),
            issuer: "test".into(),
            session_ttl: std::time::Duration::from_secs(300),
            reset_ttl: std::time::Duration::from_secs(300),
        };
        let token = foreign.sign_reset(1).expect("sign reset");

        let err = reset_password(
            State(state),
            Json(ResetPasswordRequest {
                token,
                new_password: "pw2".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn reset_password_rejects_a_session_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_session(1, Role::User).expect("sign session");

        let err = reset_password(
            State(state),
            Json(ResetPasswordRequest {
                token,
                new_password: "pw2".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }
}
