pub mod auth;
pub mod canonical;
pub mod config;
mod error;
pub mod http;
pub mod image_input;
pub mod paths;
pub mod pipeline;
pub mod render;
pub mod runlog;
pub mod search;
pub mod thumbnail;
pub mod upload;

pub use error::{EngineError, Result};
