extern crate futures;
extern crate futures_cpupool;
extern crate gastro_lib;
extern crate r2d2;
#[macro_use]
extern crate serde_json;
extern crate tempfile;

mod admin;
mod archive;
mod cash;
mod common;
mod orders;
