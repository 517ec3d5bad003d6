mod commands;
mod error;

pub use commands::Commands;
pub use error::Error;
