#![forbid(unsafe_code)]

//! ShogiStack connector: a bridge between the ShogiStack analysis server and
//! a local USI shogi engine.

pub mod config;
pub mod connector;
pub mod errors;
pub mod link;
pub mod usi;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
