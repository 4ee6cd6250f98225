use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Local;
use password_hash::SaltString;
use rand_core::OsRng;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::forms::{LoginForm, RegisterForm};
use crate::models::User;

const MAX_SESSIONS: i64 = 5;
const SESSION_COOKIE: &str = "session";
const MIN_PASSWORD_LEN: usize = 6;

fn hash_password(password: &str) -> Option<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt).ok()?;
    Some(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// The signed-in user, or `Unauthenticated` which redirects to the login page.
pub fn require_user(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<User> {
    let cookie = cookies.get(SESSION_COOKIE).ok_or(AppError::Unauthenticated)?;
    let conn = pool.get()?;
    db::user_by_session(&conn, cookie.value())?.ok_or(AppError::Unauthenticated)
}

fn current_user(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Option<User> {
    require_user(pool, cookies).ok()
}

fn start_session(conn: &rusqlite::Connection, cookies: &CookieJar<'_>, user_id: i64) -> rusqlite::Result<()> {
    let token = Uuid::new_v4().to_string();
    let created_at = Local::now().to_rfc3339();
    db::create_session(conn, user_id, &token, &created_at)?;
    db::prune_sessions(conn, user_id, MAX_SESSIONS)?;

    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookies.add(cookie);
    Ok(())
}

fn render_login(error: Option<&str>) -> Template {
    Template::render(
        "login",
        serde_json::json!({
            "error": error,
        }),
    )
}

fn render_register(error: Option<&str>, username: &str) -> Template {
    Template::render(
        "register",
        serde_json::json!({
            "error": error,
            "entered_username": username,
        }),
    )
}

#[get("/register")]
pub fn register(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Result<Template, Redirect> {
    if current_user(pool, cookies).is_some() {
        return Err(Redirect::to("/dashboard/"));
    }
    Ok(render_register(None, ""))
}

#[post("/register", data = "<form>")]
pub fn register_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    form: Form<RegisterForm>,
) -> Result<Redirect, Template> {
    let form = form.into_inner();
    let username = form.username.trim();
    if username.is_empty() {
        return Err(render_register(Some("Enter a username."), username));
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return Err(render_register(
            Some("The password must be at least 6 characters."),
            username,
        ));
    }
    if form.password != form.confirm_password {
        return Err(render_register(Some("The passwords do not match."), username));
    }

    let conn = pool
        .get()
        .map_err(|_| render_register(Some("The database is unavailable."), username))?;
    let password_hash = hash_password(&form.password)
        .ok_or_else(|| render_register(Some("Could not store the password."), username))?;
    let created_at = Local::now().to_rfc3339();
    let user_id = db::insert_user(&conn, username, &password_hash, &created_at).map_err(|err| {
        if db::is_unique_violation(&err) {
            render_register(Some("That username is taken."), username)
        } else {
            log::error!("could not create user: {err}");
            render_register(Some("Could not create the account."), username)
        }
    })?;
    start_session(&conn, cookies, user_id)
        .map_err(|_| render_register(Some("Could not start a session."), username))?;

    log::info!("registered user {user_id}");
    Ok(Redirect::to("/dashboard/"))
}

#[get("/login")]
pub fn login(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Result<Template, Redirect> {
    if current_user(pool, cookies).is_some() {
        return Err(Redirect::to("/dashboard/"));
    }
    Ok(render_login(None))
}

#[post("/login", data = "<form>")]
pub fn login_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    form: Form<LoginForm>,
) -> Result<Redirect, Template> {
    let form = form.into_inner();
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(render_login(Some("Enter your username and password.")));
    }

    let conn = pool
        .get()
        .map_err(|_| render_login(Some("The database is unavailable.")))?;
    let creds = db::user_credentials(&conn, username)
        .map_err(|_| render_login(Some("Could not look up the user.")))?;
    let Some((user_id, hash)) = creds else {
        return Err(render_login(Some("Invalid username or password.")));
    };
    if !verify_password(&hash, &form.password) {
        return Err(render_login(Some("Invalid username or password.")));
    }
    start_session(&conn, cookies, user_id)
        .map_err(|_| render_login(Some("Could not start a session.")))?;

    Ok(Redirect::to("/dashboard/"))
}

#[get("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        if let Ok(conn) = pool.get() {
            if let Err(err) = db::delete_session(&conn, cookie.value()) {
                log::warn!("could not delete session: {err}");
            }
        }
    }
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookies.remove(cookie);
    Redirect::to("/login")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("secret-password").unwrap();
        assert!(verify_password(&hash, "secret-password"));
        assert!(!verify_password(&hash, "wrong"));
        assert!(!verify_password("not a hash", "secret-password"));
    }
}
