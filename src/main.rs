use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use cineclub::auth::{Accounts, TokenIssuer};
use cineclub::config::Config;
use cineclub::database::Store;
use cineclub::provider::{MovieProvider, TmdbClient};
use cineclub::{api, seed};
use log::info;
use std::sync::Arc;

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("cineclub=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env()?;

    let store = web::Data::new(
        Store::open(&config.database_path)
            .with_context(|| format!("opening database {}", config.database_path.display()))?,
    );
    let provider: Arc<dyn MovieProvider> = Arc::new(TmdbClient::new(
        &config.tmdb_base_url,
        &config.tmdb_api_key,
        config.tmdb_timeout,
    )?);
    let provider = web::Data::from(provider);
    let accounts = web::Data::new(Accounts::new(
        config.password_scheme,
        TokenIssuer::new(&config.secret_key),
    ));

    if config.seed_demo_data && seed::seed_demo_data(&store, &accounts)? {
        store.flush()?;
    }

    info!("listening on {}", config.bind);
    let server_store = store.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(server_store.clone())
            .app_data(provider.clone())
            .app_data(accounts.clone())
            .configure(api::configure)
    })
    .bind(&config.bind)?
    .run()
    .await?;

    store.flush()?;
    Ok(())
}
