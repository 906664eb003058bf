use std::{io, sync::Arc};

use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use nfe_issuer::{
    api::AppState,
    config::{self, settings::AppSettings},
    gateway::HttpFiscalGateway,
    repository::PgStore,
    services::{
        certificate_service::CertificateVault, nfe_document_service::NfeDocumentService,
        numbering_service::NumberingAllocator,
    },
    utils::{
        cipher::SecretCipher,
        clock::{Clock, SystemClock},
        logging::{init_logging, LogFormat},
    },
};

fn startup_error(message: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    init_logging(LogFormat::from_env_or_default()).map_err(startup_error)?;

    let settings = AppSettings::from_env().map_err(startup_error)?;
    log::info!("Starting NFe issuer with {:?}", settings);

    let pool = config::db::init_db_pool(&settings.database_url).map_err(startup_error)?;
    {
        let mut conn = pool.get().map_err(startup_error)?;
        config::db::run_migration(&mut conn).map_err(startup_error)?;
    }

    let store = Arc::new(PgStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cipher = SecretCipher::derive(&settings.vault.secret, &settings.vault.salt).map_err(startup_error)?;
    let gateway = Arc::new(HttpFiscalGateway::from_settings(&settings.gateway).map_err(startup_error)?);

    let vault = CertificateVault::new(store.clone(), store.clone(), cipher, clock.clone());
    let numbering = NumberingAllocator::new(store.clone(), clock.clone());
    let documents = NfeDocumentService::new(store.clone(), store, numbering, vault.clone(), gateway, clock)
        .with_gateway_timeout(settings.gateway.timeout);

    let sweeper = vault.clone();
    let sweep_interval = settings.vault.sweep_interval;
    actix_rt::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let vault = sweeper.clone();
            match tokio::task::spawn_blocking(move || vault.expire_sweep()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("Certificate expiry sweep failed: {}", e),
                Err(e) => log::error!("Certificate expiry sweep task failed: {}", e),
            }
        }
    });

    let state = web::Data::new(AppState::new(documents, vault).with_pool(pool));
    let bind = (settings.host.clone(), settings.port);
    log::info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(config::app::config_services)
    })
    .bind(bind)?
    .run()
    .await
}
