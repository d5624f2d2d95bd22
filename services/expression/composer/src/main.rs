#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate rocket;

use std::sync::Arc;

use log::info;
use reqwest::ClientBuilder;
use tokio::time::Duration;

use crate::client::{Gateway, HttpGateway};
use crate::session::SessionStore;

mod api;
mod client;
mod config;
mod error;
mod expression;
mod session;

#[rocket::main]
async fn main() {
    env_logger::init();
    let figment = config::figment();
    let config: config::Config = figment.extract().expect("Invalid configuration");

    let http_client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.upstream.timeout_secs))
        .build()
        .expect("Failed to build HTTP Client");

    let gateway = Arc::new(HttpGateway::new(http_client, &config.upstream.evaluator));
    let sessions = Arc::new(SessionStore::new(&config.sessions));
    info!("Submitting expressions to {}", config.upstream.evaluator);

    let result = rocket::custom(figment)
        .manage(sessions)
        .manage(gateway as Arc<dyn Gateway>)
        .mount("/", api::routes())
        .launch()
        .await;

    assert!(result.is_ok());
}
