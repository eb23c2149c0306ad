extern crate chrono;
extern crate log;
extern crate rustls;
extern crate rustls_pki_types;

use crate::dream::logger;

pub mod dream;

pub static DREAM_LOGGER: logger::Logger = logger::Logger;
