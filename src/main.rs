//! Gastro is a multi-tenant ordering and point-of-sale backend.
//! This create is for running the service from `gastro_lib`. See `gastro_lib` for details.

fn main() {
    env_logger::init();

    let config = gastro_lib::config::Config::new().expect("Can't load app config!");

    gastro_lib::start_server(config);
}
