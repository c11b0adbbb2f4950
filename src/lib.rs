//! Client library for the remote cutting-stock optimizer: problem editing,
//! session lifecycle, optimize dispatch, run history, and result rendering.

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod render;
pub mod report;
pub mod session;
pub mod store;
pub mod types;

pub use error::{Error, Result};
