// Library for tests to access modules

pub mod agent;
pub mod config;
pub mod miner_api;
pub mod models;
pub mod proxy_client;
pub mod routes;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod version;
pub mod worker;
