use crate::middlewares::require_admin;
use crate::models::*;
use crate::services::{PrizeService, RedemptionService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/codes",
    tag = "admin",
    request_body = GenerateCodesRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "生成兑换码成功", body = GenerateCodesResponse),
        (status = 400, description = "数量不合法"),
        (status = 401, description = "未授权"),
        (status = 403, description = "非管理员")
    )
)]
/// 批量生成兑换码（1-1000）
pub async fn generate_codes(
    service: web::Data<RedemptionService>,
    req: HttpRequest,
    body: web::Json<GenerateCodesRequest>,
) -> Result<HttpResponse> {
    let identity = match require_admin(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };
    match service.generate_codes(body.count).await {
        Ok(data) => {
            log::info!("Admin {} generated {} codes", identity.user_id, data.codes.len());
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/codes",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取兑换码列表成功", body = PaginatedResponse<RedeemCodeResponse>),
        (status = 401, description = "未授权"),
        (status = 403, description = "非管理员")
    )
)]
/// 兑换码台账（倒序分页），含兑换人资料与绑定奖品
pub async fn list_codes(
    service: web::Data<RedemptionService>,
    req: HttpRequest,
    query: web::Query<RedeemCodeQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.list_codes(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/prizes",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取奖品列表成功", body = [Prize]),
        (status = 401, description = "未授权"),
        (status = 403, description = "非管理员")
    )
)]
pub async fn list_prizes(
    service: web::Data<PrizeService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.list().await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/prizes",
    tag = "admin",
    request_body = CreatePrizeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建奖品成功", body = Prize),
        (status = 400, description = "参数不合法"),
        (status = 401, description = "未授权"),
        (status = 403, description = "非管理员")
    )
)]
pub async fn create_prize(
    service: web::Data<PrizeService>,
    req: HttpRequest,
    body: web::Json<CreatePrizeRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.create(&body).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/prizes/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "奖品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取奖品成功", body = Prize),
        (status = 404, description = "奖品不存在")
    )
)]
pub async fn get_prize(
    service: web::Data<PrizeService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.get(path.into_inner()).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/prizes/{id}",
    tag = "admin",
    request_body = UpdatePrizeRequest,
    params(
        ("id" = i64, Path, description = "奖品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改奖品名称成功", body = Prize),
        (status = 404, description = "奖品不存在")
    )
)]
pub async fn rename_prize(
    service: web::Data<PrizeService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdatePrizeRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.rename(path.into_inner(), &body).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/prizes/{id}/stock",
    tag = "admin",
    request_body = RestockPrizeRequest,
    params(
        ("id" = i64, Path, description = "奖品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "补货成功", body = Prize),
        (status = 404, description = "奖品不存在"),
        (status = 409, description = "版本号已变化，需重新读取后再提交")
    )
)]
/// 按版本号条件设置剩余库存
pub async fn restock_prize(
    service: web::Data<PrizeService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<RestockPrizeRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.restock(path.into_inner(), &body).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/prizes/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "奖品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "奖品不存在"),
        (status = 409, description = "奖品已被兑换码引用")
    )
)]
pub async fn delete_prize(
    service: web::Data<PrizeService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Prize deleted" }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/codes", web::post().to(generate_codes))
            .route("/codes", web::get().to(list_codes))
            .route("/prizes", web::get().to(list_prizes))
            .route("/prizes", web::post().to(create_prize))
            .route("/prizes/{id}", web::get().to(get_prize))
            .route("/prizes/{id}", web::patch().to(rename_prize))
            .route("/prizes/{id}", web::delete().to(delete_prize))
            .route("/prizes/{id}/stock", web::put().to(restock_prize)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedemptionConfig;
    use crate::middlewares::AuthMiddleware;
    use crate::store::MemoryStore;
    use crate::utils::{JwtService, ROLE_ADMIN};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use std::sync::Arc;

    const SECRET: &str = "admin-test-secret";

    macro_rules! admin_app {
        ($store:expr) => {{
            let store: MemoryStore = $store;
            let redemption = RedemptionService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                &RedemptionConfig::default(),
            );
            let prizes = PrizeService::new(Arc::new(store.clone()));
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(JwtService::new(SECRET)))
                    .app_data(web::Data::new(redemption))
                    .app_data(web::Data::new(prizes))
                    .service(web::scope("/api/v1").configure(admin_config)),
            )
            .await
        }};
    }

    fn bearer(role: &str) -> (&'static str, String) {
        let token = JwtService::new(SECRET)
            .generate_token(7, role, 3600)
            .unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    #[actix_web::test]
    async fn test_non_admin_is_forbidden() {
        let app = admin_app!(MemoryStore::new());

        let req = test::TestRequest::get()
            .uri("/api/v1/admin/prizes")
            .insert_header(bearer("user"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_prize_lifecycle() {
        let app = admin_app!(MemoryStore::new());

        let req = test::TestRequest::post()
            .uri("/api/v1/admin/prizes")
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "name": "Tumbler", "stock": 4 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        let id = body["data"]["id"].as_i64().unwrap();
        let version = body["data"]["version"].as_i64().unwrap();

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/admin/prizes/{id}"))
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "name": "Steel Tumbler" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["name"], "Steel Tumbler");

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/admin/prizes/{id}/stock"))
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "expected_version": version, "remaining_stock": 10 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["remaining_stock"], 10);

        // 旧版本号再次补货被拒绝
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/admin/prizes/{id}/stock"))
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "expected_version": version, "remaining_stock": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/admin/prizes/{id}"))
            .insert_header(bearer(ROLE_ADMIN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/admin/prizes/{id}"))
            .insert_header(bearer(ROLE_ADMIN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_generate_and_list_codes() {
        let app = admin_app!(MemoryStore::new());

        let req = test::TestRequest::post()
            .uri("/api/v1/admin/codes")
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "count": 3 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["codes"].as_array().map(Vec::len), Some(3));

        let req = test::TestRequest::get()
            .uri("/api/v1/admin/codes?page=1&per_page=2")
            .insert_header(bearer(ROLE_ADMIN))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["data"]["data"][0]["state"], "pending");

        let req = test::TestRequest::post()
            .uri("/api/v1/admin/codes")
            .insert_header(bearer(ROLE_ADMIN))
            .set_json(json!({ "count": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
