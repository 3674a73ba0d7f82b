use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::database::DbPool;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateUserRequest, PaginatedResponse, PaginationParams, UpdateUserRequest, User, UserQuery,
    normalize_email,
};
use crate::utils::{hash_password, validate_password};

/// 后台账号管理
#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(self.pool.as_ref())
            .await?)
    }

    pub async fn create(&self, request: &CreateUserRequest) -> AppResult<User> {
        request.validate()?;
        validate_password(&request.password)?;

        let email = normalize_email(&request.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let model = users::ActiveModel {
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            role: Set(request.role.as_str().to_string()),
            password_hash: Set(password_hash),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await
        .map_err(email_taken)?;

        log::info!("User {} ({}) created with role {}", model.id, model.email, model.role);
        Ok(model.into())
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<PaginatedResponse<User>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let total = users::Entity::find().count(self.pool.as_ref()).await?;
        let list = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(self.pool.as_ref())
            .await?;
        let items = list.into_iter().map(Into::into).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, user_id: i64) -> AppResult<User> {
        Ok(self.find(user_id).await?.into())
    }

    /// 部分更新；修改密码时重新哈希
    pub async fn update(&self, user_id: i64, request: &UpdateUserRequest) -> AppResult<User> {
        request.validate()?;
        if let Some(password) = &request.password {
            validate_password(password)?;
        }

        let model = self.find(user_id).await?;
        let mut am = model.into_active_model();

        if let Some(name) = &request.name {
            am.name = Set(name.trim().to_string());
        }
        if let Some(email) = &request.email {
            let email = normalize_email(email);
            if let Some(other) = self.find_by_email(&email).await?
                && other.id != user_id
            {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            am.email = Set(email);
        }
        if let Some(password) = &request.password {
            am.password_hash = Set(hash_password(password)?);
        }
        if let Some(role) = request.role {
            am.role = Set(role.as_str().to_string());
        }
        am.updated_at = Set(Utc::now());

        let updated = am.update(self.pool.as_ref()).await.map_err(email_taken)?;
        Ok(updated.into())
    }

    pub async fn delete(&self, user_id: i64) -> AppResult<()> {
        let result = users::Entity::delete_by_id(user_id)
            .exec(self.pool.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }
        log::info!("User {user_id} deleted");
        Ok(())
    }

    async fn find(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }
}

/// 查重与写入之间被并发注册抢先：由唯一索引兜底
fn email_taken(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Email already registered".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
