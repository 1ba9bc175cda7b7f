use std::sync::Arc;

use tracing::info;

use crate::models::{AuthSession, LoginRequest, NewUser, RegisterRequest, Role, User};
use crate::repositories::UserStore;
use crate::utils::auth::JwtKeys;
use crate::utils::error::{AppError, AppResult};
use crate::utils::password::{hash_password, verify_password};

const MIN_PASSWORD_LEN: usize = 8;

/// Registration and login. Login hands out the same bearer tokens the
/// `CurrentUser` extractor verifies.
#[derive(Clone)]
pub struct AuthService<S> {
    store: S,
    jwt: Arc<JwtKeys>,
}

impl<S> AuthService<S> {
    pub fn new(store: S, jwt: Arc<JwtKeys>) -> Self {
        Self { store, jwt }
    }
}

impl<S: UserStore> AuthService<S> {
    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        let email = normalize_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let role = registration_role(request.role.as_deref())?;
        let name = match request.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::InternalServerError(format!("hashing task failed: {}", e)))??;

        let user = self
            .store
            .create_user(NewUser {
                name,
                email,
                password_hash,
                role,
            })
            .await?;

        info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthSession> {
        let invalid = || AppError::Unauthenticated("Invalid credentials".to_string());

        if request.password.is_empty() {
            return Err(AppError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }
        let email = normalize_email(&request.email)?;

        let credentials = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        let password = request.password;
        let stored = credentials.password_hash;
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| AppError::InternalServerError(format!("verify task failed: {}", e)))??;
        if !matches {
            return Err(invalid());
        }

        let user = credentials.user;
        let token = self.jwt.issue(&user.identity())?;

        info!(user_id = user.id, "User logged in");
        Ok(AuthSession { token, user })
    }
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::ValidationError(
            "A valid email is required".to_string(),
        )),
    }
}

/// Unknown roles fall back to `USER`. Admins are provisioned out of band.
fn registration_role(requested: Option<&str>) -> AppResult<Role> {
    match requested.map(str::parse::<Role>) {
        Some(Ok(Role::Admin)) => Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        )),
        Some(Ok(role)) => Ok(role),
        Some(Err(_)) | None => Ok(Role::User),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;

    fn service() -> AuthService<MemoryStore> {
        AuthService::new(
            MemoryStore::new(),
            Arc::new(JwtKeys::from_secret(b"auth-service-test")),
        )
    }

    fn register_request(email: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: "Organizadora".to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            role: role.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let user = service
            .register(register_request(" Org@Eventos.test ", Some("organizer")))
            .await
            .unwrap();
        assert_eq!(user.email, "org@eventos.test");
        assert_eq!(user.role, Role::Organizer);

        let session = service
            .login(LoginRequest {
                email: "ORG@eventos.test".to_string(),
                password: "s3cret-pass".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user, user);

        let identity = service.jwt.verify(&session.token).unwrap();
        assert_eq!(identity, user.identity());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = service();
        service
            .register(register_request("ana@eventos.test", None))
            .await
            .unwrap();

        let err = service
            .register(register_request("ANA@eventos.test", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let service = service();
        service
            .register(register_request("ana@eventos.test", None))
            .await
            .unwrap();

        for (email, password) in [
            ("ana@eventos.test", "wrong-password"),
            ("nadie@eventos.test", "s3cret-pass"),
        ] {
            let err = service
                .login(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Authentication required: Invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_registration_roles() {
        let service = service();

        let user = service
            .register(register_request("a@eventos.test", Some("superuser")))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);

        let err = service
            .register(register_request("b@eventos.test", Some("ADMIN")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service();

        let err = service
            .register(register_request("not-an-email", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut request = register_request("c@eventos.test", None);
        request.password = "short".to_string();
        let err = service.register(request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut request = register_request("d@eventos.test", None);
        request.name = "  ".to_string();
        let user = service.register(request).await.unwrap();
        assert_eq!(user.name, "d");
    }
}
