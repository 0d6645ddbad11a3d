// Centralized logging for the login and extraction flows
use log::{debug, info, warn};

use crate::error::PortalError;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the start of a login handshake; credentials are never logged
    pub fn log_login_start(portal: &str, strategy: &str, tenant: &str) {
        info!("🔐 Starting {strategy} login for portal {portal} (tenant: {tenant})");
    }

    /// Log the login outcome
    pub fn log_login_outcome(portal: &str, strategy: &str, error: Option<&PortalError>) {
        match error {
            None => info!("✅ {strategy} login succeeded for portal {portal}"),
            Some(err) => warn!("❌ {strategy} login failed for portal {portal}: {err}"),
        }
    }

    /// Log presence of the verification token without its value
    pub fn log_verification_token(portal: &str, present: bool) {
        debug!(
            "Verification token for {}: {}",
            portal,
            if present { "present" } else { "missing" }
        );
    }

    /// Log a built request context; cookie values are not logged
    pub fn log_context_built(portal: &str, structure_id: &str, cookie_names: &[&str]) {
        debug!("Request context for {portal} (structure {structure_id}): cookies {cookie_names:?}");
    }

    /// Log a data call to the portal
    pub fn log_portal_call(method: &str, url: &str) {
        debug!("➡️  {method} {url}");
    }

    /// Log an upstream answer that could not be used
    pub fn log_upstream_failure(url: &str, err: &PortalError) {
        warn!("Portal call to {url} failed: {err}");
    }

    /// Log how many records a list extraction produced
    pub fn log_extraction_summary(entity: &str, rows: usize, extracted: usize) {
        info!("🔍 Extracted {extracted} {entity} record(s) from {rows} row(s)");
    }

    /// Log the result of a concurrent fan-out
    pub fn log_fan_out_summary(entity: &str, total: usize, failed: usize) {
        if failed == 0 {
            info!("🎯 Loaded {total} {entity} detail(s)");
        } else {
            warn!("🎯 Loaded {total} {entity} detail(s), {failed} failed");
        }
    }

    /// Log a browser automation step
    pub fn log_browser_step(step: &str) {
        debug!("🌐 Browser: {step}");
    }
}
