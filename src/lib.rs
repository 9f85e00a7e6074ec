pub mod client;
pub mod database;
pub mod generation;
pub mod host;
pub mod ingest;
pub mod media;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
