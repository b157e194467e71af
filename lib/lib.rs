//! `bundle-build` library.

pub mod assemble;
pub mod catalog;
pub mod cdn;
pub mod commands;
pub mod config;
pub mod constants;
pub mod deps;
pub mod error;
pub mod feed;
pub mod fs;
pub mod http;
pub mod pack;
pub mod pipeline;
pub mod runner;
pub mod steps;
pub mod suggest;
pub mod targets;

#[cfg(test)]
mod testing;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use catalog::*;
pub use commands::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use pipeline::*;
pub use targets::*;
