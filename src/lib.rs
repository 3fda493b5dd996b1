//! Gastro is a multi-tenant ordering and point-of-sale backend for small restaurants.
//! The layered structure of the app is
//!
//! `Application -> Controller -> Service -> Repo -> DbConnection`
//!
//! Each layer can only face exceptions in its base layers and can only expose its own errors.
//! E.g. `Service` layer will only deal with `Repo` errors and will only return
//! `ServiceError`. That way Controller will only have to deal with ServiceError, but not with `Repo`
//! errors.

extern crate config as config_crate;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
#[macro_use]
extern crate validator_derive;

#[macro_use]
pub mod macros;
#[macro_use]
pub mod db;
pub mod config;
pub mod controller;
pub mod errors;
pub mod http;
pub mod models;
pub mod repos;
pub mod scheduler;
pub mod services;

use std::path::Path;
use std::process;
use std::sync::Arc;

use futures::{Future, Stream};
use futures_cpupool::CpuPool;
use hyper::server::Http;
use tokio_core::reactor::Core;

use self::config::Config;
use self::controller::context::StaticContext;
use self::db::{DbConnectionManager, DbPool};
use self::errors::Error;
use self::http::Application;
use self::repos::repo_factory::ReposFactoryImpl;

/// Creates missing tables and applies the tenant files of `config_dir`
pub fn prepare_database(db_pool: &DbPool, config: &Config) -> Result<(), failure::Error> {
    let conn = db_pool.get()?;
    db::bootstrap(&conn)?;
    let report = db::seed::seed_from_dir(&conn, Path::new(&config.server.config_dir), &config.auth)?;
    debug!("Database ready: {:?}", report);
    Ok(())
}

/// Starts new web service from provided `Config`
pub fn start_server(config: Config) {
    // Prepare reactor
    let mut core = Core::new().expect("Unexpected error creating event loop core");
    let handle = Arc::new(core.handle());

    // Prepare server
    let thread_count = config.server.thread_count;
    let address = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Could not parse address");

    // Prepare database pool
    let manager = DbConnectionManager::new(config.server.database.clone());
    let db_pool = r2d2::Pool::builder()
        .max_size(config.server.db_pool_size)
        .build(manager)
        .expect("Failed to create connection pool");
    if let Err(e) = prepare_database(&db_pool, &config) {
        error!("Database initialization error: {}", e);
        process::exit(1);
    }

    // Prepare CPU pool
    let cpu_pool = CpuPool::new(thread_count);

    let repo_factory = ReposFactoryImpl::new();
    let config = Arc::new(config);

    let static_context = StaticContext::new(db_pool, cpu_pool, config, repo_factory);

    if let Err(e) = scheduler::start_auto_archive(&handle, static_context.clone()) {
        error!("Auto-archive initialization error: {}", e);
        process::exit(1);
    }

    let serve = Http::new()
        .serve_addr_handle(&address, &handle, move || {
            let controller = controller::ControllerImpl::new(static_context.clone());

            // Prepare application
            let app = Application::<Error>::new(controller);

            Ok(app)
        })
        .unwrap_or_else(|why| {
            error!("Http Server Initialization Error: {}", why);
            process::exit(1);
        });

    let handle_arc2 = handle.clone();
    handle.spawn(
        serve
            .for_each(move |conn| {
                handle_arc2.spawn(conn.map(|_| ()).map_err(|why| error!("Server Error: {:?}", why)));
                Ok(())
            })
            .map_err(|_| ()),
    );

    info!("Listening on http://{}, threads: {}", address, thread_count);
    core.run(tokio_signal::ctrl_c().flatten_stream().take(1u64).for_each(|()| {
        info!("Ctrl+C received. Exit");

        Ok(())
    }))
    .unwrap_or_else(|why| {
        error!("Signal handling error: {}", why);
        process::exit(1);
    });
}
