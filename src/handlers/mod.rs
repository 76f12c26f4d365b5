pub mod codec;
pub mod config;

pub use codec::*;
pub use config::*;
