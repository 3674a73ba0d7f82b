use crate::models::*;
use crate::services::RedemptionService;
use actix_web::{HttpResponse, Result, web};

#[utoipa::path(
    post,
    path = "/redeem",
    tag = "redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "兑换成功（prize 为 null 表示库存已耗尽）", body = RedeemResponse),
        (status = 400, description = "兑换人资料不完整或超出长度限制", body = RedeemResponse),
        (status = 404, description = "兑换码不存在", body = RedeemResponse),
        (status = 409, description = "兑换码已被兑换", body = RedeemResponse),
        (status = 503, description = "暂时无法完成，可稍后重试", body = RedeemResponse)
    )
)]
/// 使用兑换码领取奖品:
/// 1. 校验兑换码存在且未兑换
/// 2. 校验兑换人资料完整且不超长
/// 3. 随机分配一个有库存的奖品并绑定到兑换码
pub async fn redeem(
    service: web::Data<RedemptionService>,
    request: web::Json<RedeemRequest>,
) -> Result<HttpResponse> {
    match service.redeem(&request).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(RedeemResponse::granted(prize))),
        Err(e) => {
            if e.is_transient() {
                log::error!("Redeem of code {} failed: {e}", request.code.trim());
            } else {
                log::warn!("Redeem of code {} rejected: {e}", request.code.trim());
            }
            Ok(HttpResponse::build(e.status_code()).json(RedeemResponse::failed(&e)))
        }
    }
}

/// 路由配置
pub fn redeem_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/redeem", web::post().to(redeem));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedemptionConfig;
    use crate::error::RedeemErrorKind;
    use crate::store::{DbRedemptionLedger, InventoryStore, MemoryStore, RedemptionLedger};
    use actix_web::{App, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};
    use serde_json::json;
    use std::sync::Arc;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create("Tshirt", 1).await.unwrap();
        store.issue("WIN00001").await.unwrap();
        store.issue("WIN00002").await.unwrap();
        store
    }

    fn body(code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "name": "Dewi",
            "national_id": "3578000000000003",
            "city": "Surabaya",
            "address": "Jl. Tunjungan 5",
            "phone": "0813"
        })
    }

    #[actix_web::test]
    async fn test_redeem_status_mapping() {
        let store = seeded_store().await;
        let service = RedemptionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            &RedemptionConfig::default(),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .service(web::scope("/api/v1").configure(redeem_config)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(body("WIN00001"))
            .to_request();
        let resp: RedeemResponse = test::call_and_read_body_json(&app, req).await;
        assert!(resp.success);
        assert_eq!(resp.prize.map(|p| p.name), Some("Tshirt".to_string()));

        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(body("WIN00001"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp: RedeemResponse = test::read_body_json(resp).await;
        assert_eq!(resp.error_kind, Some(RedeemErrorKind::AlreadyRedeemed));

        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(body("UNKNOWN0"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(json!({ "code": "WIN00002", "name": "Dewi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp: RedeemResponse = test::read_body_json(resp).await;
        assert_eq!(resp.error_kind, Some(RedeemErrorKind::MissingFields));

        let mut overlong = body("WIN00002");
        overlong["phone"] = json!("0".repeat(MAX_PHONE_CHARS + 1));
        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(overlong)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp: RedeemResponse = test::read_body_json(resp).await;
        assert_eq!(resp.error_kind, Some(RedeemErrorKind::InvalidFields));

        // 唯一的奖品已发出，第二个码成功兑换但未中奖
        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(body("WIN00002"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp: RedeemResponse = test::read_body_json(resp).await;
        assert!(resp.success);
        assert!(resp.prize.is_none());
    }

    #[actix_web::test]
    async fn test_redeem_with_ledger_down_is_service_unavailable() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Conn(RuntimeErr::Internal(
                "connection refused".into(),
            ))])
            .into_connection();
        let service = RedemptionService::new(
            Arc::new(seeded_store().await),
            Arc::new(DbRedemptionLedger::new(db)),
            &RedemptionConfig::default(),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .service(web::scope("/api/v1").configure(redeem_config)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/redeem")
            .set_json(body("WIN00001"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp: RedeemResponse = test::read_body_json(resp).await;
        assert!(!resp.success);
        assert_eq!(resp.error_kind, Some(RedeemErrorKind::StoreUnavailable));
    }
}
