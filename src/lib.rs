pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use config::{load_catalog, Catalog};
pub use core::client::ServiceClient;
pub use core::registry::SkillRegistry;
pub use core::transport::ReqwestTransport;
pub use core::webhook::{WebhookEvent, WebhookVerifier};
pub use domain::model::{ApiResponse, HttpMethod, Record};
pub use utils::error::{Result, SkillError};
