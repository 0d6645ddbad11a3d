//! Session acquisition and per-call request contexts
//!
//! Login strategies implement [`SessionAcquirer`]; [`AcquirerFactory`] picks
//! one per portal from configuration. [`RequestContextBuilder`] turns the
//! resulting [`SessionCredential`] into the cookie set data calls carry.

pub mod acquirer;
pub mod browser;
pub mod context;
pub mod credential;
pub mod factory;
pub mod token_replay;

pub use acquirer::SessionAcquirer;
pub use browser::{BrowserLoginAcquirer, BrowserSession};
pub use context::{RequestContext, RequestContextBuilder, TenantParams};
pub use credential::{LoginCredentials, SessionCredential};
pub use factory::{AcquirerFactory, SharedAcquirer};
pub use token_replay::TokenReplayAcquirer;
