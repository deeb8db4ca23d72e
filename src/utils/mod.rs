// src/utils/mod.rs
pub mod dates;
pub mod error;
pub mod files_io;
pub mod logging;

pub use error::AppError; // Re-export main error type for convenience
