//! Testing utilities for portalkit
//!
//! Available to unit tests and, through the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - portal configurations and credentials pointing at a local fixture
//! - [`html`] - captured-style markup and JSON payloads
//! - [`server`] - an in-process portal built on actix-web
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portalkit::testing::{FixturePortal, TestFixtures};
//!
//! let portal = FixturePortal::start(|cfg| {
//!     cfg.route("/Login", web::get().to(login_page));
//! })?;
//! let config = TestFixtures::portal(portal.base_url());
//! ```

pub mod fixtures;
pub mod html;
pub mod server;

pub use fixtures::TestFixtures;
pub use server::FixturePortal;

/// Common test constants
pub mod constants {
    /// Anti-forgery token embedded in [`super::html::LOGIN_PAGE`]
    pub const FIXTURE_VERIFICATION_TOKEN: &str = "fixture-token-123";

    /// Credential the fixture portal sets on a good login
    pub const FIXTURE_AUTH_TOKEN: &str = "abc123";

    pub const TEST_LOGIN: &str = "recepcao@clinica.test";
    pub const TEST_PASSWORD: &str = "correct-horse";

    /// Handler delay that outlasts [`super::TestFixtures::impatient_http`]
    pub const SLOW_RESPONSE_MS: u64 = 1_000;
}
