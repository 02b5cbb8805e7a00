use serde::{Deserialize, Serialize};

use crate::auth::middleware::Principal;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// Cookie holding the logged-in demo username.
pub const DEMO_COOKIE: &str = "jotion_demo_user";

/// Built-in demo user definition.
#[derive(Debug, Clone)]
struct DemoUser {
    username: &'static str,
    password: &'static str,
    name: &'static str,
    email: &'static str,
}

/// The hard-coded demo users available in demo mode.
const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        username: "alice",
        password: "alice",
        name: "Alice",
        email: "alice@demo.jotion.dev",
    },
    DemoUser {
        username: "bob",
        password: "bob",
        name: "Bob",
        email: "bob@demo.jotion.dev",
    },
];

impl DemoUser {
    fn to_user(&self) -> AuthenticatedUser {
        AuthenticatedUser::new(format!("demo-{}", self.username), self.email, self.name)
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: AuthenticatedUser,
}

/// Every demo user, for seeding.
pub fn demo_users() -> Vec<AuthenticatedUser> {
    DEMO_USERS.iter().map(DemoUser::to_user).collect()
}

/// Look up a demo user by username.
pub fn demo_user(username: &str) -> Option<AuthenticatedUser> {
    DEMO_USERS
        .iter()
        .find(|u| u.username == username)
        .map(DemoUser::to_user)
}

/// Validate demo credentials and return the corresponding user.
pub fn authenticate_demo_user(username: &str, password: &str) -> Result<AuthenticatedUser, AppError> {
    DEMO_USERS
        .iter()
        .find(|u| u.username == username && u.password == password)
        .map(DemoUser::to_user)
        .ok_or_else(|| AppError::Unauthenticated("Invalid username or password".into()))
}

/// `POST /api/auth/login`: demo login.
///
/// Validates credentials against the built-in user table.
/// On success, sets the demo cookie and returns the user info.
pub async fn login_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    jar: axum_extra::extract::CookieJar,
    axum::Json(req): axum::Json<LoginRequest>,
) -> Result<(axum_extra::extract::CookieJar, axum::Json<LoginResponse>), AppError> {
    if !state.auth.demo_mode {
        return Err(AppError::NotFound("Demo login is disabled".into()));
    }

    let user = authenticate_demo_user(&req.username, &req.password)?;

    let cookie = axum_extra::extract::cookie::Cookie::build((DEMO_COOKIE, req.username))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(time::Duration::days(7))
        .build();

    tracing::info!(user_id = %user.user_id, "Demo login");

    Ok((
        jar.add(cookie),
        axum::Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

/// `GET /api/auth/me`: the current principal.
pub async fn me_handler(principal: Principal) -> Result<axum::Json<AuthenticatedUser>, AppError> {
    principal
        .0
        .map(axum::Json)
        .ok_or_else(|| AppError::Unauthenticated("Not logged in".into()))
}

/// `POST /api/auth/logout`: clear the demo session cookie.
pub async fn logout_handler(
    jar: axum_extra::extract::CookieJar,
) -> axum_extra::extract::CookieJar {
    let cookie = axum_extra::extract::cookie::Cookie::build((DEMO_COOKIE, ""))
        .path("/")
        .removal()
        .build();

    jar.remove(cookie)
}
