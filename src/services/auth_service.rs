use crate::config::AdminSeedConfig;
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, CreateUserRequest, RegisterRequest, SignInRequest, UserRole};
use crate::services::UserService;
use crate::utils::{JwtService, ROLE_ADMIN, verify_password};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    jwt_service: JwtService,
    expires_in: i64,
}

impl AuthService {
    pub fn new(users: UserService, jwt_service: JwtService, expires_in: i64) -> Self {
        Self {
            users,
            jwt_service,
            expires_in,
        }
    }

    /// 公开注册：角色固定为 user，注册成功即返回 token
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<AuthResponse> {
        request.validate()?;
        let user = self.users.create(&CreateUserRequest::from(request)).await?;
        let token = self
            .jwt_service
            .generate_token(user.id, &user.role, self.expires_in)?;

        Ok(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            token,
            expires_in: self.expires_in,
        })
    }

    pub async fn sign_in(&self, request: &SignInRequest) -> AppResult<AuthResponse> {
        // 用户不存在与密码错误返回同一条信息
        let user = self
            .users
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            log::warn!("Sign-in failed for user {}", user.id);
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        let token = self
            .jwt_service
            .generate_token(user.id, &user.role, self.expires_in)?;
        log::info!("User {} signed in", user.id);

        Ok(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            token,
            expires_in: self.expires_in,
        })
    }

    /// 启动时确保配置中的管理员账号存在；已存在则不做修改
    pub async fn ensure_admin(&self, seed: &AdminSeedConfig) -> AppResult<()> {
        if let Some(existing) = self.users.find_by_email(&seed.email).await? {
            if existing.role != ROLE_ADMIN {
                log::warn!(
                    "Seed admin {} exists with role {}; leaving it unchanged",
                    existing.email,
                    existing.role
                );
            }
            return Ok(());
        }

        let admin = self
            .users
            .create(&CreateUserRequest {
                name: seed.name.clone(),
                email: seed.email.clone(),
                password: seed.password.clone(),
                role: UserRole::Admin,
            })
            .await?;
        log::info!("Seeded admin account {}", admin.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user_entity as users;
    use crate::utils::{ROLE_USER, hash_password};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    const SECRET: &str = "test-secret";

    fn user_row(role: &str, password: &str) -> users::Model {
        users::Model {
            id: 5,
            name: "Ops".into(),
            email: "ops@example.com".into(),
            role: role.into(),
            password_hash: hash_password(password).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn auth_over(db: MockDatabase) -> AuthService {
        AuthService::new(
            UserService::new(Arc::new(db.into_connection())),
            JwtService::new(SECRET),
            3600,
        )
    }

    #[tokio::test]
    async fn test_admin_sign_in_issues_admin_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(ROLE_ADMIN, "Password123")]]);

        let resp = auth_over(db)
            .sign_in(&SignInRequest {
                email: "OPS@example.com".into(),
                password: "Password123".into(),
            })
            .await
            .unwrap();

        assert_eq!(resp.role, ROLE_ADMIN);
        assert_eq!(resp.expires_in, 3600);
        let identity = JwtService::new(SECRET).verify_token(&resp.token).unwrap();
        assert_eq!(identity.user_id, 5);
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_wrong_password_and_unknown_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([
            vec![user_row(ROLE_USER, "Password123")],
            vec![],
        ]);
        let auth = auth_over(db);

        let wrong = auth
            .sign_in(&SignInRequest {
                email: "ops@example.com".into(),
                password: "Password124".into(),
            })
            .await;
        let unknown = auth
            .sign_in(&SignInRequest {
                email: "nobody@example.com".into(),
                password: "Password123".into(),
            })
            .await;

        match (wrong, unknown) {
            (Err(AppError::AuthError(a)), Err(AppError::AuthError(b))) => assert_eq!(a, b),
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_always_creates_plain_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([
            vec![],
            vec![user_row(ROLE_USER, "Password123")],
        ]);

        let resp = auth_over(db)
            .register(&RegisterRequest {
                name: "Ops".into(),
                email: "ops@example.com".into(),
                password: "Password123".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.role, ROLE_USER);
        let identity = JwtService::new(SECRET).verify_token(&resp.token).unwrap();
        assert!(!identity.is_admin());
    }

    #[tokio::test]
    async fn test_ensure_admin_skips_existing_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(ROLE_ADMIN, "Password123")]]);

        auth_over(db)
            .ensure_admin(&AdminSeedConfig {
                name: "Ops".into(),
                email: "ops@example.com".into(),
                password: "Password123".into(),
            })
            .await
            .unwrap();
    }
}
