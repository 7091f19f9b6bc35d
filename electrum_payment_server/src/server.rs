use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use electrum_payment_engine::{PaymentGateway, PaymentStore, PaymentsApi, PgStore, RedsysClient};
use log::info;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

use crate::{
    config::{AppConfig, ListenConfig},
    errors::ServerError,
    routes::{notify, pay_transaction, return_order, return_transaction},
};

pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    if !config.store.enabled {
        return Err(ServerError::Configuration(
            "the store is disabled; electrum cannot run without its document store".to_string(),
        ));
    }
    let store = PgStore::new_with_url(&config.store.url(), config.store.max_connections, config.log_records)
        .await
        .map_err(|e| ServerError::StoreInit(e.to_string()))?;
    let gateway =
        RedsysClient::new(&config.merchant.request_url).map_err(|e| ServerError::Configuration(e.to_string()))?;
    let srv = create_server_instance(config, store, gateway)?;
    srv.await.map_err(ServerError::Io)
}

pub fn create_server_instance<B, G>(config: AppConfig, store: B, gateway: G) -> Result<Server, ServerError>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let merchant = config.merchant_config();
    let debug = config.is_debug;
    let listen = config.listen.clone();

    let srv = HttpServer::new(move || {
        let api = PaymentsApi::new(merchant.clone(), store.clone(), gateway.clone(), debug);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %U").log_target("electrum_server"))
            .app_data(web::Data::new(api))
            .service(web::resource("/pay/{transaction_id}").route(web::get().to(pay_transaction::<B, G>)))
            .service(web::resource("/return/order/{order_id}").route(web::post().to(return_order::<B, G>)))
            .service(web::resource("/return/{transaction_id}").route(web::get().to(return_transaction::<B, G>)))
            .service(web::resource("/notify").route(web::post().to(notify::<B, G>)))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(90)));

    let address = (listen.bind_ip.clone(), listen.port);
    let srv = if listen.tls_enabled {
        info!("🚀️ starting https TLS on {}:{}", listen.bind_ip, listen.port);
        srv.bind_openssl(address, tls_acceptor(&listen)?)?
    } else {
        info!("🚀️ starting http on {}:{}", listen.bind_ip, listen.port);
        srv.bind(address)?
    };
    Ok(srv.run())
}

fn tls_acceptor(listen: &ListenConfig) -> Result<openssl::ssl::SslAcceptorBuilder, ServerError> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())
        .map_err(|e| ServerError::Configuration(e.to_string()))?;
    builder
        .set_private_key_file(&listen.key_file, SslFiletype::PEM)
        .map_err(|e| ServerError::Configuration(format!("key file {}: {e}", listen.key_file)))?;
    builder
        .set_certificate_chain_file(&listen.cert_file)
        .map_err(|e| ServerError::Configuration(format!("cert file {}: {e}", listen.cert_file)))?;
    Ok(builder)
}
