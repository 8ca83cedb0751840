use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use dotenvy::dotenv;
use tokio::time::MissedTickBehavior;

use storefront_orders::application::carrier_poller::{CarrierPoller, CarrierRegistry};
use storefront_orders::application::outbox_dispatcher::OutboxDispatcher;
use storefront_orders::config::Config;
use storefront_orders::domain::errors::DomainError;
use storefront_orders::domain::ports::{Notifier, Store};
use storefront_orders::infrastructure::carrier::HttpCarrierSource;
use storefront_orders::infrastructure::invoice::FileInvoiceGenerator;
use storefront_orders::infrastructure::notifier::{LogNotifier, SmtpNotifier};
use storefront_orders::infrastructure::pg_store::DieselStore;
use storefront_orders::{build_server, create_pool, run_migrations, AppState};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let pool = create_pool(&config.database_url).map_err(startup_error)?;
    run_migrations(&pool).map_err(startup_error)?;
    let store: Arc<dyn Store> = Arc::new(DieselStore::new(pool));

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp).map_err(startup_error)?),
        None => {
            log::warn!("SMTP is not configured; notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let dispatcher = Arc::new(OutboxDispatcher::new(
        store.clone(),
        notifier,
        Arc::new(FileInvoiceGenerator::new(&config.invoice_dir)),
        config.company.clone(),
        config.outbox.max_attempts,
    ));
    spawn_outbox_loop(dispatcher, config.outbox.poll_secs, config.outbox.batch_size);

    let mut carriers = CarrierRegistry::new();
    for (company, endpoint) in &config.carrier.endpoints {
        carriers.register(company, Arc::new(HttpCarrierSource::new(endpoint.as_str())));
    }
    if carriers.is_empty() {
        log::info!("no carrier endpoints configured; delivery polling disabled");
    } else {
        let poller = Arc::new(CarrierPoller::new(store.clone(), carriers));
        spawn_carrier_loop(poller, config.carrier.poll_secs);
    }

    let state = web::Data::new(
        AppState::new(store, config.gateway.clone(), &config.business_email)
            .map_err(startup_error)?,
    );

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}

fn startup_error(e: DomainError) -> io::Error {
    log::error!("startup failed: {e}");
    io::Error::other(e.to_string())
}

fn ticker(secs: u64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

// Each loop awaits its pass before the next tick, so passes never overlap.
fn spawn_outbox_loop(dispatcher: Arc<OutboxDispatcher>, poll_secs: u64, batch: usize) {
    actix_web::rt::spawn(async move {
        let mut ticker = ticker(poll_secs);
        loop {
            ticker.tick().await;
            let dispatcher = dispatcher.clone();
            match web::block(move || dispatcher.dispatch_pending(batch)).await {
                Ok(Ok(summary)) if summary.dispatched + summary.failed + summary.abandoned > 0 => {
                    log::info!(
                        "outbox pass: {} dispatched, {} failed, {} abandoned",
                        summary.dispatched,
                        summary.failed,
                        summary.abandoned
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("outbox pass failed: {e}"),
                Err(e) => log::error!("outbox pass aborted: {e}"),
            }
        }
    });
}

fn spawn_carrier_loop(poller: Arc<CarrierPoller>, poll_secs: u64) {
    actix_web::rt::spawn(async move {
        let mut ticker = ticker(poll_secs);
        loop {
            ticker.tick().await;
            let poller = poller.clone();
            match web::block(move || poller.poll_once()).await {
                Ok(Ok(summary)) => log::info!(
                    "carrier poll: {} checked, {} delivered, {} updated, {} skipped",
                    summary.checked,
                    summary.delivered,
                    summary.updated,
                    summary.skipped
                ),
                Ok(Err(e)) => log::error!("carrier poll failed: {e}"),
                Err(e) => log::error!("carrier poll aborted: {e}"),
            }
        }
    });
}
