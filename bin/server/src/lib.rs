//! HTTP server for the Brigade restaurant back-office assistants.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
