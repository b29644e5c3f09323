pub mod chart;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod routes;
pub mod service;
