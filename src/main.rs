use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use redeem_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::{AuthService, PrizeService, ProductService, RedemptionService, UserService},
    store::{DbInventoryStore, DbRedemptionLedger, InventoryStore, RedemptionLedger},
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;

    // 运行数据库迁移
    run_migrations(&pool).await?;

    let jwt_service = JwtService::new(&config.jwt.secret);

    // 库存与台账共用同一个连接池
    let inventory: Arc<dyn InventoryStore> = Arc::new(DbInventoryStore::new(pool.clone()));
    let ledger: Arc<dyn RedemptionLedger> = Arc::new(DbRedemptionLedger::new(pool.clone()));

    // 创建服务
    let redemption_service =
        RedemptionService::new(inventory.clone(), ledger, &config.redemption);
    let prize_service = PrizeService::new(inventory);
    let user_service = UserService::new(pool.clone());
    let auth_service =
        AuthService::new(user_service.clone(), jwt_service.clone(), config.jwt.expires_in);
    let product_service = ProductService::new(pool.clone());

    // 确保配置中的管理员账号存在
    if let Some(seed) = &config.admin {
        auth_service.ensure_admin(seed).await?;
    }

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(redemption_service.clone()))
            .app_data(web::Data::new(prize_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(product_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::redeem_config)
                    .configure(handlers::admin_config)
                    .configure(handlers::users_config)
                    .configure(handlers::products_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
