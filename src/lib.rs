pub mod comments;
pub mod config;
pub mod counters;
pub mod db;
pub mod error;
pub mod identity;
pub mod interactions;
pub mod models;
pub mod ranking;
pub mod routes;
