//! Portal workflows composed from the session, client and extraction layers
//!
//! One [`PortalWorkflow`] per configured portal. Detail look-ups fan out
//! concurrently; presentation order always comes from an explicit sort key.

use std::cmp::Ordering;
use std::future::Future;

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PortalError;
use crate::extract::{
    ensure_not_login_page, AppointmentRecord, ClientRecord, ComandaRecord, HtmlEntityExtractor,
    ScheduleItem,
};
use crate::portal::PortalClient;
use crate::session::{
    AcquirerFactory, LoginCredentials, RequestContext, RequestContextBuilder, SessionCredential,
    SharedAcquirer, TenantParams,
};
use crate::settings::{HttpSettings, PortalConfig, PortalSettings};
use crate::status::{StatusRecord, StatusRegistry};
use crate::temporal::{iso_date_to_portal, portal_day_bounds, TemporalNormalizer};
use crate::utils::logging::LoggingHelper;

/// Page size the client list is requested with; the portal has no streaming list
const CLIENT_LIST_LENGTH: &str = "10000";
const DATATABLES_COLUMNS: usize = 6;

/// Data a portal may serve, used to pick a portal when the caller names none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOperation {
    Comandas,
    Clients,
    DailySchedule,
}

impl DataOperation {
    fn label(self) -> &'static str {
        match self {
            Self::Comandas => "comandas",
            Self::Clients => "clients",
            Self::DailySchedule => "the daily schedule",
        }
    }

    fn path(self, portal: &PortalConfig) -> Option<&str> {
        let endpoints = &portal.endpoints;
        match self {
            Self::Comandas => endpoints
                .comanda_detail
                .as_ref()
                .and(endpoints.comanda_list.as_deref()),
            Self::Clients => endpoints.client_list.as_deref(),
            Self::DailySchedule => endpoints.scheduler_read.as_deref(),
        }
    }
}

/// Filters of the comanda list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComandaQuery {
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default = "ComandaQuery::default_status")]
    pub status: String,
    #[serde(default = "ComandaQuery::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub start: u32,
    #[serde(default = "ComandaQuery::default_length")]
    pub length: u32,
}

impl ComandaQuery {
    pub fn for_date(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            status: Self::default_status(),
            kind: Self::default_kind(),
            start: 0,
            length: Self::default_length(),
        }
    }

    fn default_status() -> String {
        "2".to_string()
    }

    fn default_kind() -> String {
        "1".to_string()
    }

    fn default_length() -> u32 {
        10
    }
}

/// DataTables server-side page; comandas use `aaData`, clients `data`
#[derive(Debug, Default, Deserialize)]
struct DataTablesPage {
    #[serde(rename = "aaData", alias = "data", default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ComandaDetailResponse {
    #[serde(rename = "sucesso", default, deserialize_with = "truthy")]
    success: bool,
    #[serde(rename = "dados", default)]
    html: Option<String>,
}

/// Loose truthiness; the flag arrives as a boolean, a number or a string
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    })
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePage {
    #[serde(rename = "Data", default)]
    data: Option<Vec<ScheduleItem>>,
}

/// Await every future, then order the results by `compare`
///
/// Completion order never leaks into the output. The first error wins and the
/// remaining fetches are dropped.
///
/// # Errors
///
/// Returns the first error any fetch produced.
pub async fn fetch_concurrently_sorted<T, E, Fut, I, C>(
    fetches: I,
    compare: C,
) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&T, &T) -> Ordering,
{
    let mut results = try_join_all(fetches).await?;
    results.sort_by(compare);
    Ok(results)
}

/// Normalised date first, undated records last, id as tie-breaker
fn comanda_order(a: &ComandaRecord, b: &ComandaRecord) -> Ordering {
    let key = |r: &ComandaRecord| (r.date.is_none(), r.date.as_ref().map(|d| d.instant));
    key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
}

fn appointment_order(a: &AppointmentRecord, b: &AppointmentRecord) -> Ordering {
    let key = |r: &AppointmentRecord| (r.start.is_none(), r.start.as_ref().map(|d| d.instant));
    key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
}

/// Query parameters of a DataTables server-side request
fn datatables_params(start: &str, length: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = [
        ("draw", "1"),
        ("start", start),
        ("length", length),
        ("order[0][column]", "0"),
        ("order[0][dir]", "asc"),
        ("search[value]", ""),
        ("search[regex]", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for index in 0..DATATABLES_COLUMNS {
        let orderable = index + 1 < DATATABLES_COLUMNS;
        params.extend([
            (format!("columns[{index}][data]"), index.to_string()),
            (format!("columns[{index}][name]"), String::new()),
            (format!("columns[{index}][searchable]"), "true".to_string()),
            (format!("columns[{index}][orderable]"), orderable.to_string()),
            (format!("columns[{index}][search][value]"), String::new()),
            (format!("columns[{index}][search][regex]"), "false".to_string()),
        ]);
    }
    params.push(("_".to_string(), Utc::now().timestamp_millis().to_string()));
    params
}

/// Session, data client and extractor for one portal
pub struct PortalWorkflow {
    acquirer: SharedAcquirer,
    contexts: RequestContextBuilder,
    client: PortalClient,
    extractor: HtmlEntityExtractor,
}

impl PortalWorkflow {
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] when the portal is invalid.
    pub fn new(portal: &PortalConfig, http: &HttpSettings) -> Result<Self, PortalError> {
        let acquirer = AcquirerFactory::for_portal(portal, http)?;
        Self::with_acquirer(portal, http, acquirer)
    }

    /// Build around an existing acquirer
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] if the HTTP client cannot be built.
    pub fn with_acquirer(
        portal: &PortalConfig,
        http: &HttpSettings,
        acquirer: SharedAcquirer,
    ) -> Result<Self, PortalError> {
        Ok(Self {
            acquirer,
            contexts: RequestContextBuilder::from_portal(portal),
            client: PortalClient::new(portal.clone(), http)?,
            extractor: HtmlEntityExtractor::new(TemporalNormalizer::with_offset_minutes(
                portal.utc_offset_minutes,
            )),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.client.portal().name
    }

    #[must_use]
    pub fn supports(&self, operation: DataOperation) -> bool {
        operation.path(self.client.portal()).is_some()
    }

    fn endpoint(&self, operation: DataOperation) -> Result<&str, PortalError> {
        operation.path(self.client.portal()).ok_or_else(|| {
            PortalError::InvalidRequest(format!(
                "portal '{}' does not serve {}",
                self.name(),
                operation.label()
            ))
        })
    }

    /// Log in and return the session credential
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidRequest`] for incomplete credentials, otherwise
    /// whatever the portal's acquirer reports.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        tenant: Option<&str>,
    ) -> Result<SessionCredential, PortalError> {
        if !credentials.is_complete() {
            return Err(PortalError::InvalidRequest(
                "login and password are required".to_string(),
            ));
        }
        self.acquirer
            .acquire(credentials, tenant.unwrap_or_default())
            .await
    }

    /// Request context for a caller-held token
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::AuthenticationFailure`] when no token was supplied.
    pub fn context(
        &self,
        token: Option<&str>,
        params: &TenantParams,
    ) -> Result<RequestContext, PortalError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PortalError::authentication("session token not provided"))?;
        Ok(self
            .contexts
            .build(&SessionCredential::new(token, ""), params))
    }

    /// Comandas of one day with their service lines and client contact
    ///
    /// A failed detail look-up yields a record carrying `detail_error`; it does
    /// not fail the batch. An expired session does.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidRequest`] for a malformed date or a portal
    /// without comandas, [`PortalError::AuthenticationFailure`] when any call of
    /// the batch is rejected, and the list call's own failure otherwise.
    pub async fn list_comandas(
        &self,
        context: &RequestContext,
        query: &ComandaQuery,
    ) -> Result<Vec<ComandaRecord>, PortalError> {
        let list_path = self.endpoint(DataOperation::Comandas)?;
        let day = iso_date_to_portal(&query.date)?;

        let mut params = datatables_params(&query.start.to_string(), &query.length.to_string());
        params.extend([
            ("status".to_string(), query.status.clone()),
            ("parTipoComanda".to_string(), query.kind.clone()),
            ("parDataIni".to_string(), day.clone()),
            ("parDataFim".to_string(), day),
        ]);

        let page: DataTablesPage = self.client.get_json(list_path, &params, context).await?;
        let ids: Vec<String> = page
            .rows
            .iter()
            .filter_map(|row| {
                let id = self.row_comanda_id(row);
                if id.is_none() {
                    log::warn!("Skipping comanda row without an id");
                }
                id
            })
            .collect();
        LoggingHelper::log_extraction_summary("comanda", page.rows.len(), ids.len());

        let records = fetch_concurrently_sorted(
            ids.iter().map(|id| self.comanda_detail(context, id)),
            comanda_order,
        )
        .await?;
        let failed = records.iter().filter(|r| r.detail_error.is_some()).count();
        LoggingHelper::log_fan_out_summary("comanda", records.len(), failed);
        Ok(records)
    }

    fn row_comanda_id(&self, row: &[Value]) -> Option<String> {
        row.iter()
            .filter_map(Value::as_str)
            .find_map(|cell| self.extractor.comanda_id(cell))
    }

    /// Detail of one comanda; only a session failure escapes
    async fn comanda_detail(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> Result<ComandaRecord, PortalError> {
        match self.load_comanda(context, id).await {
            Err(err) if err.is_authentication() => Err(err),
            Err(err) => {
                log::warn!("Comanda {id} detail not loaded: {err}");
                Ok(ComandaRecord::failed(id, &err))
            }
            ok => ok,
        }
    }

    async fn load_comanda(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> Result<ComandaRecord, PortalError> {
        let endpoints = &self.client.portal().endpoints;
        let path = endpoints.comanda_detail.as_deref().ok_or_else(|| {
            PortalError::Configuration(format!("portal '{}' has no comanda_detail", self.name()))
        })?;

        let form = [("id", id), ("origem", "comanda"), ("dataReserva", "undefined")];
        let detail: ComandaDetailResponse = self.client.post_form_json(path, &form, context).await?;
        if !detail.success {
            return Err(PortalError::ExtractionFailure(format!(
                "portal reported no detail for comanda {id}"
            )));
        }
        let html = detail.html.unwrap_or_default();
        ensure_not_login_page(&html)?;

        let mut record = self.extractor.comanda_record(id, &html);
        if let Some(client_id) = record.client.client_id.clone() {
            match self.client_contact(context, &client_id).await {
                Ok(contact) => record.client = record.client.merge(contact),
                Err(err) if err.is_authentication() => return Err(err),
                Err(err) => log::warn!("Contact for client {client_id} not loaded: {err}"),
            }
        }
        Ok(record)
    }

    async fn client_contact(
        &self,
        context: &RequestContext,
        client_id: &str,
    ) -> Result<ClientRecord, PortalError> {
        let Some(path) = self.client.portal().endpoints.client_form.as_deref() else {
            return Ok(ClientRecord::default());
        };
        let form = [("id", client_id), ("nome", ""), ("tel", ""), ("idr", "")];
        let html = self.client.post_form_text(path, &form, context).await?;
        Ok(self.extractor.client_contact(&html))
    }

    /// Appointments of one day, ordered by normalised start time
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidRequest`] for a malformed date or a portal
    /// without a scheduler, and the scheduler call's failure otherwise.
    pub async fn daily_appointments(
        &self,
        context: &RequestContext,
        date: &str,
    ) -> Result<Vec<AppointmentRecord>, PortalError> {
        let path = self.endpoint(DataOperation::DailySchedule)?;
        let (start, end) = portal_day_bounds(date)?;
        let form = [
            ("sort", ""),
            ("page", "1"),
            ("pageSize", "100"),
            ("group", ""),
            ("filter", ""),
            ("establishment", ""),
            ("locality", ""),
            ("start", start.as_str()),
            ("end", end.as_str()),
        ];

        let page: SchedulePage = self.client.post_form_json(path, &form, context).await?;
        let items = page.data.unwrap_or_default();
        let mut records: Vec<AppointmentRecord> = items
            .iter()
            .map(|item| self.extractor.appointment(item))
            .collect();
        records.sort_by(appointment_order);
        LoggingHelper::log_extraction_summary("appointment", items.len(), records.len());
        Ok(records)
    }

    /// Every client of the current structure
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidRequest`] for a portal without a client list,
    /// and the list call's failure otherwise.
    pub async fn list_clients(
        &self,
        context: &RequestContext,
    ) -> Result<Vec<ClientRecord>, PortalError> {
        let path = self.endpoint(DataOperation::Clients)?;
        let params = datatables_params("0", CLIENT_LIST_LENGTH);
        let page: DataTablesPage = self.client.get_json(path, &params, context).await?;
        let clients: Vec<ClientRecord> = page
            .rows
            .iter()
            .map(|row| self.extractor.client_list_row(row))
            .collect();
        LoggingHelper::log_extraction_summary("client", page.rows.len(), clients.len());
        Ok(clients)
    }
}

/// Every configured portal workflow, in configuration order
pub struct Orchestrator {
    workflows: Vec<PortalWorkflow>,
}

impl Orchestrator {
    /// # Errors
    ///
    /// Returns the first portal configuration error.
    pub fn from_settings(settings: &PortalSettings) -> Result<Self, PortalError> {
        let mut acquirers = AcquirerFactory::for_settings(settings)?;
        let workflows = settings
            .portals
            .iter()
            .map(|portal| {
                let acquirer = acquirers.remove(&portal.name).ok_or_else(|| {
                    PortalError::Configuration(format!(
                        "portal name '{}' is configured more than once",
                        portal.name
                    ))
                })?;
                PortalWorkflow::with_acquirer(portal, &settings.http, acquirer)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { workflows })
    }

    /// Workflow named `name`, else the first one serving `operation`
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidRequest`] when the named portal is unknown or
    /// no portal serves the operation.
    pub fn portal(
        &self,
        name: Option<&str>,
        operation: Option<DataOperation>,
    ) -> Result<&PortalWorkflow, PortalError> {
        let found = match (name, operation) {
            (Some(name), _) => self.workflows.iter().find(|w| w.name() == name),
            (None, Some(operation)) => self.workflows.iter().find(|w| w.supports(operation)),
            (None, None) => self.workflows.first(),
        };
        found.ok_or_else(|| match (name, operation) {
            (Some(name), _) => PortalError::InvalidRequest(format!("unknown portal '{name}'")),
            (None, Some(operation)) => PortalError::InvalidRequest(format!(
                "no configured portal serves {}",
                operation.label()
            )),
            (None, None) => PortalError::Configuration("no portals configured".to_string()),
        })
    }

    #[must_use]
    pub fn statuses() -> Vec<StatusRecord> {
        StatusRegistry::all_known()
    }
}
