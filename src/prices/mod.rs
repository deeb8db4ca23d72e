// src/prices/mod.rs
pub mod oracle;
pub mod scorer;

pub use oracle::{PriceOracle, QuandlClient};
pub use scorer::PriceMovementScorer;
