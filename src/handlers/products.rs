use crate::middlewares::{require_admin, require_identity};
use crate::models::*;
use crate::services::ProductService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取商品列表成功", body = PaginatedResponse<Product>),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_products(
    service: web::Data<ProductService>,
    req: HttpRequest,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_identity(&req) {
        return Ok(e.error_response());
    }
    match service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = CreateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建商品成功", body = Product),
        (status = 400, description = "参数不合法"),
        (status = 403, description = "非管理员")
    )
)]
pub async fn create_product(
    service: web::Data<ProductService>,
    req: HttpRequest,
    body: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.create(&body).await {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": product }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取商品成功", body = Product),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn get_product(
    service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_identity(&req) {
        return Ok(e.error_response());
    }
    match service.get(path.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": product }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    request_body = UpdateProductRequest,
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新商品成功", body = Product),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn update_product(
    service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.update(path.into_inner(), &body).await {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": product }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn delete_product(
    service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }
    match service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Product deleted" }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn products_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("", web::post().to(create_product))
            .route("/{id}", web::get().to(get_product))
            .route("/{id}", web::patch().to(update_product))
            .route("/{id}", web::delete().to(delete_product)),
    );
}
