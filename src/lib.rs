pub mod api;
pub mod config;
pub mod consts;
pub mod domain;
pub mod error;
pub mod model;
pub mod projector;
pub mod search;
pub mod verifier;

pub use crate::error::{TfResult, TimeForgeError};
