// src/infosfera/mod.rs
pub mod client;
pub mod models;
pub mod parser;
pub mod throttle;

// Re-export key scraping types for convenience
pub use client::InfosferaClient;
pub use models::CorrespondingStock;
