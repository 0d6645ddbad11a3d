// Request and response bodies of the HTTP surface
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extract::AppointmentRecord;
use crate::session::LoginCredentials;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "login")]
    pub identifier: String,
    #[serde(alias = "password")]
    pub secret: String,
    /// Tenant slug or organizational structure id
    #[serde(default)]
    pub tenant: Option<String>,
    /// Portal name; falls back to the `x-portal` header
    #[serde(default)]
    pub portal: Option<String>,
}

impl LoginRequest {
    #[must_use]
    pub fn credentials(&self) -> LoginCredentials {
        LoginCredentials::new(self.identifier.clone(), self.secret.clone())
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DailyScheduleRequest {
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct DailyScheduleResponse {
    pub success: bool,
    pub date: String,
    pub total: usize,
    pub procedures: Vec<AppointmentRecord>,
    /// Appointment count per canonical status id
    pub by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
