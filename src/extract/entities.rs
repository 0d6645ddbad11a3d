//! Records produced by extraction
//!
//! Every field that comes from markup is optional or has a neutral default:
//! a missing field never invalidates the rest of a record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rows::RowBoundary;
use super::rules::{comanda_id_rule, rules_for};
use super::{ExtractedFields, HtmlEntityExtractor};
use crate::error::PortalError;
use crate::status::{StatusRecord, StatusRegistry};
use crate::temporal::{NormalizedTimestamp, SourceEncoding};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

static SERVICE_ROWS: Lazy<RowBoundary> = Lazy::new(|| {
    RowBoundary::table_rows_with_class("itemComanda")
        .unwrap()
        .with_container("itemComanda")
});

/// Entity types with a rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ServiceLine,
    Comanda,
    ClientContact,
    ClientListRow,
}

/// One service line of a comanda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLineItem {
    pub item: Option<String>,
    pub item_type: Option<String>,
    pub line_id: Option<String>,
    pub service_id: Option<String>,
    pub professional_id: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub discount: f64,
    pub total: f64,
    pub commission: f64,
    pub cost: f64,
    pub reservation_id: Option<String>,
    pub promotion_id: Option<String>,
}

impl ServiceLineItem {
    fn from_fields(fields: &ExtractedFields) -> Self {
        Self {
            item: fields.text("item"),
            item_type: fields.text("item_type"),
            line_id: fields.text("line_id"),
            service_id: fields.text("service_id"),
            professional_id: fields.text("professional_id"),
            quantity: fields.number("quantity"),
            unit_price: fields.number("unit_price"),
            discount: fields.number("discount"),
            total: fields.number("total"),
            commission: fields.number("commission"),
            cost: fields.number("cost"),
            reservation_id: fields.text("reservation_id"),
            promotion_id: fields.text("promotion_id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: Option<String>,
    pub name: Option<String>,
    /// Digits as served by the portal
    pub phone: Option<String>,
    pub formatted_phone: Option<String>,
    pub email: Option<String>,
    /// Display text, the portal does not use a stable format here
    pub birthday: Option<String>,
}

impl ClientRecord {
    fn with_phone(mut self, phone: Option<String>) -> Self {
        self.formatted_phone = phone.as_deref().map(format_phone);
        self.phone = phone;
        self
    }

    /// Fill contact fields missing here from `other`
    #[must_use]
    pub fn merge(mut self, other: ClientRecord) -> Self {
        self.client_id = self.client_id.or(other.client_id);
        self.name = self.name.or(other.name);
        self.email = self.email.or(other.email);
        self.birthday = self.birthday.or(other.birthday);
        if self.phone.is_none() {
            self = self.with_phone(other.phone);
        }
        self
    }
}

/// A service order with its lines and client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComandaRecord {
    pub id: String,
    pub number: Option<String>,
    pub date: Option<NormalizedTimestamp>,
    pub client: ClientRecord,
    pub services: Vec<ServiceLineItem>,
    pub total_services: usize,
    pub services_total_value: f64,
    /// Set when the detail call failed; the record then only carries the id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

impl ComandaRecord {
    /// Placeholder for a comanda whose detail could not be loaded
    #[must_use]
    pub fn failed(id: &str, error: &PortalError) -> Self {
        Self {
            id: id.to_string(),
            number: None,
            date: None,
            client: ClientRecord::default(),
            services: Vec::new(),
            total_services: 0,
            services_total_value: 0.0,
            detail_error: Some(error.to_string()),
        }
    }

    fn with_services(mut self, services: Vec<ServiceLineItem>) -> Self {
        self.total_services = services.len();
        self.services_total_value = services.iter().map(|s| s.total).sum();
        self.services = services;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub procedure_id: Option<String>,
    pub procedure_name: Option<String>,
    pub locality_id: Option<String>,
    pub locality_name: Option<String>,
    pub start: Option<NormalizedTimestamp>,
    pub end: Option<NormalizedTimestamp>,
    pub status: StatusRecord,
    pub status_description: Option<String>,
}

/// Scheduler item as served by the portal's `Scheduler/Read` endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleItem {
    #[serde(rename = "Id")]
    pub id: Value,
    #[serde(rename = "Client_Id")]
    pub client_id: Value,
    #[serde(rename = "Client_Name")]
    pub client_name: Option<String>,
    #[serde(rename = "Client_FlattenedPhones")]
    pub client_phones: Option<String>,
    #[serde(rename = "Item_Id")]
    pub item_id: Value,
    #[serde(rename = "Item_Name")]
    pub item_name: Option<String>,
    #[serde(rename = "Start")]
    pub start: Option<String>,
    #[serde(rename = "End")]
    pub end: Option<String>,
    #[serde(rename = "Status")]
    pub status: Value,
    #[serde(rename = "StatusDescription")]
    pub status_description: Option<String>,
    #[serde(rename = "Locality_Id")]
    pub locality_id: Value,
    #[serde(rename = "Locality_Name")]
    pub locality_name: Option<String>,
}

/// Tagged union over every record the extractor produces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedEntity {
    ServiceLineItem(ServiceLineItem),
    Client(ClientRecord),
    Comanda(ComandaRecord),
    Appointment(AppointmentRecord),
}

impl HtmlEntityExtractor {
    /// Service lines of a comanda detail fragment, in document order
    #[must_use]
    pub fn service_items(&self, fragment: &str) -> Vec<ServiceLineItem> {
        let rules = rules_for(EntityKind::ServiceLine);
        self.extract_rows(fragment, &SERVICE_ROWS)
            .into_iter()
            .map(|row| ServiceLineItem::from_fields(&self.extract_fields(row, rules)))
            .collect()
    }

    /// Comanda header and lines; contact details are merged in later
    #[must_use]
    pub fn comanda_record(&self, id: &str, fragment: &str) -> ComandaRecord {
        let fields = self.extract_fields(fragment, rules_for(EntityKind::Comanda));
        ComandaRecord {
            id: id.to_string(),
            number: fields.text("number"),
            date: fields.timestamp("date"),
            client: ClientRecord {
                client_id: fields.text("client_id"),
                name: fields.text("client_name"),
                ..ClientRecord::default()
            },
            services: Vec::new(),
            total_services: 0,
            services_total_value: 0.0,
            detail_error: None,
        }
        .with_services(self.service_items(fragment))
    }

    /// Client form fragment (phone, email, name)
    #[must_use]
    pub fn client_contact(&self, fragment: &str) -> ClientRecord {
        let fields = self.extract_fields(fragment, rules_for(EntityKind::ClientContact));
        ClientRecord {
            client_id: fields.text("client_id"),
            name: fields.text("name"),
            email: fields.text("email"),
            birthday: fields.text("birthday"),
            ..ClientRecord::default()
        }
        .with_phone(fields.text("phone").map(|p| digits(&p)).filter(|p| !p.is_empty()))
    }

    /// One DataTables row of the client list: name, contact cell, birthday
    #[must_use]
    pub fn client_list_row(&self, row: &[Value]) -> ClientRecord {
        let cell = |index: usize| row.get(index).and_then(Value::as_str).unwrap_or_default();

        let text = TAG.replace_all(cell(0), "");
        let mut lines = text.lines().map(str::trim);
        let name = lines
            .nth(1)
            .filter(|line| !line.is_empty())
            .or_else(|| text.lines().map(str::trim).find(|line| !line.is_empty()))
            .map(ToString::to_string);

        let fields = self.extract_fields(cell(1), rules_for(EntityKind::ClientListRow));
        ClientRecord {
            name,
            email: fields.text("email"),
            birthday: Some(cell(2).trim().to_string()).filter(|b| !b.is_empty()),
            ..ClientRecord::default()
        }
        .with_phone(fields.text("phone"))
    }

    /// Scheduler item with normalised times and a resolved status
    #[must_use]
    pub fn appointment(&self, item: &ScheduleItem) -> AppointmentRecord {
        let normalize = |raw: Option<&str>| {
            raw.and_then(|raw| {
                self.normalizer()
                    .normalize(raw, Some(SourceEncoding::EpochSentinel))
                    .map_err(|err| log::warn!("Appointment time not normalised: {err}"))
                    .ok()
            })
        };

        AppointmentRecord {
            id: value_to_string(&item.id).unwrap_or_default(),
            client_id: value_to_string(&item.client_id),
            client_name: item.client_name.clone(),
            client_phone: item.client_phones.clone(),
            procedure_id: value_to_string(&item.item_id),
            procedure_name: item.item_name.clone(),
            locality_id: value_to_string(&item.locality_id),
            locality_name: item.locality_name.clone(),
            start: normalize(item.start.as_deref()),
            end: normalize(item.end.as_deref()),
            status: StatusRegistry::resolve(&value_to_string(&item.status).unwrap_or_default()),
            status_description: item.status_description.clone(),
        }
    }

    /// Comanda id from the action column of a list row
    #[must_use]
    pub fn comanda_id(&self, cell: &str) -> Option<String> {
        self.extract_raw(cell, comanda_id_rule())
    }

    /// Build a single entity of `kind` from a markup fragment
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::ExtractionFailure`] when a comanda fragment has no
    /// service table at all, or when the fragment is a login page.
    pub fn extract_entity(
        &self,
        kind: EntityKind,
        fragment: &str,
    ) -> Result<Vec<ExtractedEntity>, PortalError> {
        super::ensure_not_login_page(fragment)?;
        Ok(match kind {
            EntityKind::ServiceLine => {
                SERVICE_ROWS.require(fragment)?;
                self.service_items(fragment)
                    .into_iter()
                    .map(ExtractedEntity::ServiceLineItem)
                    .collect()
            }
            EntityKind::Comanda => {
                let id = self
                    .extract_raw(fragment, comanda_id_rule())
                    .unwrap_or_default();
                vec![ExtractedEntity::Comanda(self.comanda_record(&id, fragment))]
            }
            EntityKind::ClientContact => {
                vec![ExtractedEntity::Client(self.client_contact(fragment))]
            }
            EntityKind::ClientListRow => {
                let cell = Value::String(fragment.to_string());
                vec![ExtractedEntity::Client(
                    self.client_list_row(&[cell.clone(), cell]),
                )]
            }
        })
    }
}

/// Brazilian phone layout: `(XX) XXXXX-XXXX` for 11 digits, `(XX) XXXX-XXXX` for 10
#[must_use]
pub fn format_phone(phone: &str) -> String {
    let d = digits(phone);
    match d.len() {
        11 => format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..]),
        10 => format!("({}) {}-{}", &d[..2], &d[2..6], &d[6..]),
        _ => phone.to_string(),
    }
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Render a JSON scalar as text; `2.0` stays `2.0` so the status toggle applies
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
