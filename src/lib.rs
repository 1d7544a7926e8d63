//! # smsgate
//!
//! One-time-code SMS through nineteen delivery networks behind a single async contract.
//!
//! ## Features
//!
//! - **One contract**: every provider implements [`sms_core::SmsClient`]
//! - **Selection by tag**: [`ProviderFactory`] builds an adapter from a provider tag and
//!   positional [`sms_core::ConstructionArgs`]
//! - **Vendor protocols handled per adapter**: signatures, WSSE digests, bearer tokens, XML,
//!   multipart and form encodings
//! - **Layered configuration**: files plus `SMSGATE__*` environment variables
//! - **Structured logging**: `tracing` throughout, with a JSON or pretty subscriber
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smsgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sender = ProviderFactory::new()
//!         .create(
//!             "TencentCloud",
//!             ConstructionArgs::new("AKID...", "secret", "Acme", "1234567")
//!                 .with_extra(["1400000000"]),
//!         )
//!         .await?;
//!
//!     sender
//!         .send(&params_with_code("482913"), &["+8613800138000"])
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use smsgate::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! smsgate::logging::init(&config.logging)?;
//! let registry = config.build_registry().await?;
//! let otp = registry.get("otp").expect("configured");
//! ```

pub mod config;
pub mod factory;
pub mod logging;

pub use config::*;
pub use factory::{create, ProviderFactory};

/// Common imports for smsgate usage
pub mod prelude {
    pub use crate::config::{AppConfig, HttpConfig, LoggingConfig, ProviderEntry};
    pub use crate::factory::{create, ProviderFactory};
    pub use sms_core::*;
}
