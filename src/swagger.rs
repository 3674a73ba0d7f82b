use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::RedeemStateKind;
use crate::error::RedeemErrorKind;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::redeem::redeem,
        handlers::admin::generate_codes,
        handlers::admin::list_codes,
        handlers::admin::list_prizes,
        handlers::admin::create_prize,
        handlers::admin::get_prize,
        handlers::admin::rename_prize,
        handlers::admin::restock_prize,
        handlers::admin::delete_prize,
        handlers::auth::register,
        handlers::auth::sign_in,
        handlers::auth::logout,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
    ),
    components(
        schemas(
            RedeemRequest,
            RedeemResponse,
            RedeemErrorKind,
            WonPrize,
            Prize,
            CreatePrizeRequest,
            UpdatePrizeRequest,
            RestockPrizeRequest,
            RedeemerInfo,
            RedeemStateKind,
            RedeemCodeResponse,
            RedeemCodeQuery,
            GenerateCodesRequest,
            GenerateCodesResponse,
            User,
            UserRole,
            RegisterRequest,
            SignInRequest,
            AuthResponse,
            CreateUserRequest,
            UpdateUserRequest,
            Product,
            CreateProductRequest,
            UpdateProductRequest,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "redeem", description = "Redeem code API"),
        (name = "admin", description = "Prize catalog and code issuance API"),
        (name = "auth", description = "Registration and sign-in API"),
        (name = "users", description = "Account management API"),
        (name = "products", description = "Product catalog API"),
    ),
    info(
        title = "Redeem Backend API",
        version = "1.0.0",
        description = "Redemption & prize allocation REST API documentation",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
