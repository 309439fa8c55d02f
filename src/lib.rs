// Library exports for Trainlog
// This allows integration tests and external code to use Trainlog modules

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod media;
pub mod routes;
pub mod state;
pub mod stores;
