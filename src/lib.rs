pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;
