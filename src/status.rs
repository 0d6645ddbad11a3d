//! Canonical appointment statuses
//!
//! Portals report status as numeric codes that are sometimes serialised as
//! floats (`"2"` vs `"2.0"`). Lookups never fail: unknown codes resolve to a
//! sentinel record that still carries the original value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable status triple plus the raw code it was resolved from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: String,
    pub label: String,
    pub color_hint: String,
    pub raw_value: String,
}

struct StatusEntry {
    code: &'static str,
    id: &'static str,
    label: &'static str,
    color: &'static str,
}

/// Known codes in presentation order
const STATUS_TABLE: &[StatusEntry] = &[
    StatusEntry { code: "0", id: "cancelado", label: "Cancelado", color: "#bbb" },
    StatusEntry { code: "0.6", id: "faltou", label: "Faltou", color: "#bbb" },
    StatusEntry { code: "1", id: "agendado", label: "Agendado", color: "#087" },
    StatusEntry { code: "1.5", id: "confirmado", label: "Confirmado", color: "#01A4C6" },
    StatusEntry { code: "2", id: "aguardando", label: "Aguardando", color: "#da0" },
    StatusEntry { code: "3", id: "atendimento", label: "Em Atendimento", color: "#0a0" },
    StatusEntry { code: "3.5", id: "finalizado", label: "Finalizado", color: "#4035C6" },
    StatusEntry { code: "4", id: "pago", label: "Pago", color: "#e86b6f" },
];

/// Codes the portal emits that point at a canonical entry
const STATUS_ALIASES: &[(&str, &str)] = &[("2.0", "2")];

pub const UNKNOWN_STATUS_ID: &str = "desconhecido";
const UNKNOWN_STATUS_LABEL: &str = "Status Desconhecido";
const UNKNOWN_STATUS_COLOR: &str = "#999";

/// Lookup table from raw status codes to [`StatusRecord`]s
pub struct StatusRegistry;

impl StatusRegistry {
    /// Resolve a raw code, toggling a trailing `.0` once before giving up
    #[must_use]
    pub fn resolve(code: &str) -> StatusRecord {
        let code = code.trim();
        Self::lookup(code)
            .or_else(|| Self::lookup(&toggle_trailing_zero(code)))
            .map_or_else(|| Self::unknown(code), StatusEntry::to_record)
    }

    /// Whether `resolve` would return a known record
    #[must_use]
    pub fn is_known(code: &str) -> bool {
        let code = code.trim();
        Self::lookup(code).is_some() || Self::lookup(&toggle_trailing_zero(code)).is_some()
    }

    /// All canonical records in table order
    #[must_use]
    pub fn all_known() -> Vec<StatusRecord> {
        STATUS_TABLE.iter().map(StatusEntry::to_record).collect()
    }

    /// Find a canonical record by its slug
    #[must_use]
    pub fn by_id(id: &str) -> Option<StatusRecord> {
        STATUS_TABLE
            .iter()
            .find(|entry| entry.id == id)
            .map(StatusEntry::to_record)
    }

    /// Sentinel returned for codes missing from the table
    #[must_use]
    pub fn unknown(raw: &str) -> StatusRecord {
        StatusRecord {
            id: UNKNOWN_STATUS_ID.to_string(),
            label: UNKNOWN_STATUS_LABEL.to_string(),
            color_hint: UNKNOWN_STATUS_COLOR.to_string(),
            raw_value: raw.to_string(),
        }
    }

    /// Group items by the canonical id of their status
    pub fn group_by_status<T, F>(items: Vec<T>, status_of: F) -> BTreeMap<String, Vec<T>>
    where
        F: Fn(&T) -> &StatusRecord,
    {
        let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
        for item in items {
            let id = status_of(&item).id.clone();
            groups.entry(id).or_default().push(item);
        }
        groups
    }

    fn lookup(code: &str) -> Option<&'static StatusEntry> {
        let canonical = STATUS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == code)
            .map_or(code, |(_, target)| *target);
        STATUS_TABLE.iter().find(|entry| entry.code == canonical)
    }
}

impl StatusEntry {
    fn to_record(&self) -> StatusRecord {
        StatusRecord {
            id: self.id.to_string(),
            label: self.label.to_string(),
            color_hint: self.color.to_string(),
            raw_value: self.code.to_string(),
        }
    }
}

fn toggle_trailing_zero(code: &str) -> String {
    code.strip_suffix(".0")
        .map_or_else(|| format!("{code}.0"), ToString::to_string)
}
