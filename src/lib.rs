pub mod aggregate;
pub mod cache;
pub mod config;
pub mod export;
pub mod filter;
pub mod models;
pub mod render;
pub mod report;
