use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};

use enertrack::{
    api,
    config::Config,
    db,
    services::{SyncComponents, scheduler::FanoutScheduler},
};

#[get("/")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "EnerTrack Backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn startup_error(msg: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}", msg);
    std::io::Error::other(msg.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;
    let pool = db::init_pool(&config.database).map_err(startup_error)?;
    let components = SyncComponents::build(&config, pool).map_err(startup_error)?;

    let scheduler = FanoutScheduler::start(components.engine.clone(), config.sync.interval)
        .await
        .map_err(startup_error)?;

    log::info!("Starting EnerTrack Backend at http://0.0.0.0:{}", config.port);

    let data = web::Data::new(components);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(data.clone())
            .service(health_check)
            .configure(api::config)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await;

    if let Err(e) = scheduler.shutdown(config.sync.drain_grace()).await {
        log::error!("{}", e);
    }

    server
}
