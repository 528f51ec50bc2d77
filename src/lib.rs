pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
