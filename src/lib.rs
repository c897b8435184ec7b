pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod deletion;
pub mod error;
pub mod listing;
pub mod models;
pub mod paths;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;
