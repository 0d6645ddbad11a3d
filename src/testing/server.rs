//! In-process fixture portal

use actix_web::dev::ServerHandle;
use actix_web::{rt, web, App, HttpServer};

/// A portal stand-in bound to an ephemeral local port
pub struct FixturePortal {
    base_url: String,
    handle: ServerHandle,
}

impl FixturePortal {
    /// Start a server whose routes are registered by `configure`
    ///
    /// Must run inside an actix system, e.g. `#[actix_web::test]`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub fn start<F>(configure: F) -> std::io::Result<Self>
    where
        F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
    {
        let server = HttpServer::new(move || App::new().configure(configure.clone()))
            .workers(1)
            .bind(("127.0.0.1", 0))?;
        let addr = server
            .addrs()
            .first()
            .copied()
            .ok_or_else(|| std::io::Error::other("fixture server has no address"))?;

        let server = server.run();
        let handle = server.handle();
        rt::spawn(server);

        Ok(Self {
            base_url: format!("http://{addr}"),
            handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}
