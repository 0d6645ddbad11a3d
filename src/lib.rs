#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Session acquisition and structured extraction for web administration portals
//! that expose no public API.

/// Version of the portalkit application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod extract;
pub mod handlers;
pub mod orchestrator;
pub mod portal;
pub mod session;
pub mod settings;
pub mod status;
pub mod temporal;
pub mod utils;

// Test fixtures for unit tests and, behind the `testing` feature, integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use error::{NormalizationError, PortalError};
pub use extract::HtmlEntityExtractor;
pub use orchestrator::{Orchestrator, PortalWorkflow};
pub use session::{AcquirerFactory, RequestContextBuilder, SessionAcquirer};
pub use settings::PortalSettings;
pub use status::StatusRegistry;
pub use temporal::TemporalNormalizer;
