pub mod auth;
pub mod client;
pub mod output;
pub mod payload;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod status;
pub mod transport;
pub mod webhook;

pub use crate::domain::model::{ApiResponse, Record};
pub use crate::domain::ports::Transport;
pub use crate::utils::error::Result;
