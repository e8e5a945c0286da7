// Le Marché tender engine - API core
//
// Matching, dispatch and lifecycle of procurement tenders published to
// inclusive suppliers. Business logic lives in domains/*/activities; the
// HTTP server and the cron scheduler only call into them.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
