use crate::middlewares::require_admin;
use crate::models::*;
use crate::services::UserService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取账号列表成功", body = PaginatedResponse<User>),
        (status = 401, description = "未授权"),
        (status = 403, description = "非管理员")
    )
)]
pub async fn list_users(
    service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建账号成功", body = User),
        (status = 400, description = "参数不合法"),
        (status = 403, description = "非管理员"),
        (status = 409, description = "邮箱已注册")
    )
)]
/// 管理员创建账号（可指定 admin 角色）
pub async fn create_user(
    service: web::Data<UserService>,
    req: HttpRequest,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let identity = match require_admin(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };
    match service.create(&body).await {
        Ok(user) => {
            log::info!("Admin {} created user {}", identity.user_id, user.id);
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "账号ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取账号成功", body = User),
        (status = 404, description = "账号不存在")
    )
)]
pub async fn get_user(
    service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.get(path.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    request_body = UpdateUserRequest,
    params(
        ("id" = i64, Path, description = "账号ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新账号成功", body = User),
        (status = 404, description = "账号不存在"),
        (status = 409, description = "邮箱已注册")
    )
)]
pub async fn update_user(
    service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.update(path.into_inner(), &body).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "账号ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "账号不存在")
    )
)]
pub async fn delete_user(
    service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User deleted" }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn users_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_user))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::patch().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middlewares::AuthMiddleware;
    use crate::utils::{JwtService, ROLE_USER};
    use actix_web::{App, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    const SECRET: &str = "users-test-secret";

    #[actix_web::test]
    async fn test_user_management_requires_admin() {
        // 无任何预置结果：守卫必须在访问数据库之前拒绝
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let jwt = JwtService::new(SECRET);
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .app_data(web::Data::new(UserService::new(Arc::new(db))))
                .service(web::scope("/api/v1").configure(users_config)),
        )
        .await;

        let token = jwt.generate_token(3, ROLE_USER, 600).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/users")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri("/api/v1/users/3")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
