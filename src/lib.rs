pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::bank_transfer::BankTransferService;
use crate::application::hosted_gateway::HostedGateway;
use crate::application::order_service::OrderService;
use crate::config::HostedGatewayConfig;
use crate::domain::errors::DomainError;
use crate::domain::ports::Store;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), DomainError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DomainError::Internal(format!("failed to run migrations: {e}")))?;
    Ok(())
}

/// Services shared by every request handler.
pub struct AppState {
    pub orders: OrderService,
    pub gateway: HostedGateway,
    pub transfers: BankTransferService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: HostedGatewayConfig,
        business_email: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            orders: OrderService::new(store.clone()),
            gateway: HostedGateway::new(gateway, store.clone())?,
            transfers: BankTransferService::new(store, business_email),
        })
    }
}

/// Registers every API route. Shared by the server and the HTTP tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    use handlers::{admin, orders, payments, transfers};

    cfg.service(
        web::scope("/orders")
            .route("", web::post().to(orders::create_order))
            .route("/{id}", web::get().to(orders::get_order)),
    )
    .service(
        web::scope("/payments")
            .route("/hosted/initialize", web::post().to(payments::initialize_payment))
            .route("/hosted/callback", web::post().to(payments::payment_callback))
            .route("/bank-transfer", web::post().to(transfers::submit_transfer)),
    )
    .service(
        web::scope("/admin")
            .route("/orders", web::get().to(admin::list_orders))
            .route("/orders/{id}", web::get().to(admin::get_order))
            .route("/orders/{id}/decision", web::post().to(admin::decide_order))
            .route("/orders/{id}/return", web::post().to(admin::decide_return))
            .route("/orders/{id}/exchange", web::post().to(admin::decide_exchange))
            .route("/orders/{id}/shipment", web::post().to(admin::ship_order))
            .route("/orders/{id}/delivered", web::post().to(admin::mark_delivered))
            .route("/orders/{id}/cancel", web::post().to(admin::cancel_order))
            .route("/transfers/{id}/decision", web::post().to(admin::decide_transfer))
            .route(
                "/products/{id}/stock-ledger",
                web::get().to(admin::stock_ledger),
            ),
    );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: web::Data<AppState>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = handlers::ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
