use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "注册成功", body = AuthResponse),
        (status = 400, description = "参数不合法"),
        (status = 409, description = "邮箱已注册")
    )
)]
/// 注册普通账号
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(&request).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 401, description = "邮箱或密码错误")
    )
)]
/// 邮箱 + 密码登录，返回带角色的 token
pub async fn sign_in(
    auth_service: web::Data<AuthService>,
    request: web::Json<SignInRequest>,
) -> Result<HttpResponse> {
    match auth_service.sign_in(&request).await {
        Ok(data) => Ok(HttpResponse::Ok()
            .insert_header(("Authorization", format!("Bearer {}", data.token)))
            .json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "已登出")
    )
)]
/// token 无服务端状态，客户端丢弃即可
pub async fn logout() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Successfully logged out"
    })))
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/signin", web::post().to(sign_in))
            .route("/logout", web::get().to(logout)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user_entity as users;
    use crate::middlewares::AuthMiddleware;
    use crate::services::UserService;
    use crate::utils::{JwtService, ROLE_ADMIN, hash_password};
    use actix_web::{App, http::StatusCode, test};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::Value;
    use std::sync::Arc;

    const SECRET: &str = "auth-test-secret";

    fn admin_row() -> users::Model {
        users::Model {
            id: 1,
            name: "Ops".into(),
            email: "ops@example.com".into(),
            role: ROLE_ADMIN.into(),
            password_hash: hash_password("Password123").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn test_sign_in_and_logout_are_public() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![admin_row()], vec![admin_row()]])
            .into_connection();
        let jwt = JwtService::new(SECRET);
        let auth = AuthService::new(UserService::new(Arc::new(db)), jwt.clone(), 600);
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .app_data(web::Data::new(auth))
                .service(web::scope("/api/v1").configure(auth_config)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/signin")
            .set_json(json!({ "email": "ops@example.com", "password": "Password123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("Authorization"));
        let body: Value = test::read_body_json(resp).await;
        let token = body["data"]["token"].as_str().unwrap();
        assert!(jwt.verify_token(token).unwrap().is_admin());

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/signin")
            .set_json(json!({ "email": "ops@example.com", "password": "Wrong12345" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/v1/auth/logout")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
