use std::error::Error;
use std::sync::Arc;

use log::{info, initialize_logger};
use warp::Filter;

use posttest::config::get_variable;
use posttest::environment::{Config, Environment};
use posttest::routes;
use posttest::shutdown::Shutdown;
use posttest::store::PgStore;

fn port(name: &str) -> u16 {
    get_variable(name)
        .parse()
        .unwrap_or_else(|e| panic!("parse {} as a port: {}", name, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = Arc::new(initialize_logger());
    let api_port = port("POSTTEST_PORT");
    let admin_port = port("POSTTEST_ADMIN_PORT");
    let config = Config::from_env();

    info!(logger, "Starting..."; "api_port" => api_port, "admin_port" => admin_port, "config" => ?config);

    let pool = sqlx::Pool::connect(&get_variable("POSTTEST_DB_CONNECTION_STRING")).await?;
    let environment = Environment::new(logger.clone(), Arc::new(PgStore::new(pool)), config);
    info!(logger, "Connected to the database"; "base_path" => environment.config.base_path());

    let shutdown = Shutdown::new();

    let (api_address, api_server) = warp::serve(routes::make_api_routes(environment.clone()))
        .bind_with_graceful_shutdown(([0, 0, 0, 0], api_port), shutdown.requested());

    let admin_routes = routes::admin::make_healthz_route(environment)
        .or(routes::admin::make_termination_route(shutdown.trigger()));
    let (admin_address, admin_server) = warp::serve(admin_routes)
        .bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), shutdown.requested());

    info!(logger, "Listening"; "api" => %api_address, "admin" => %admin_address);

    tokio::join!(
        shutdown.watch_signals(logger.clone()),
        api_server,
        admin_server
    );

    info!(logger, "Stopped");

    Ok(())
}
