//! Field rules and the per-entity rule tables
//!
//! A rule is a pure function `fragment -> Option<String>` plus a name, a value
//! kind and a default. Each pattern captures the value in its first matching
//! group; alternatives are tried in order and the first non-empty capture wins.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::entities::EntityKind;
use super::{decode_entities, FieldValue};

/// Attribute value in matching quotes; the other quote kind may appear inside
const QUOTED_VALUE: &str = r#"(?:"([^"]*)"|'([^']*)')"#;

/// How a captured value is converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Safe parse, rule default when not numeric
    Number,
    Flag,
    /// Routed through the temporal normalizer
    Date,
    /// Routed through the status registry
    Status,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    name: &'static str,
    patterns: Vec<Regex>,
    kind: FieldKind,
    default: FieldValue,
}

impl FieldRule {
    /// Rule from a raw regular expression whose first group is the value
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn pattern(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            patterns: vec![compile(pattern)?],
            kind: FieldKind::Text,
            default: FieldValue::Absent,
        })
    }

    /// `value` attribute of the input whose `name` attribute is `input_name`
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn input_value(name: &'static str, input_name: &str) -> Result<Self, regex::Error> {
        let mut rule = Self::pattern(name, &input_value_pattern(input_name))?;
        rule.patterns.push(compile(&input_value_reversed_pattern(input_name))?);
        Ok(rule)
    }

    /// `value` attribute of the element whose `id` is `element_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn element_value(name: &'static str, element_id: &str) -> Result<Self, regex::Error> {
        Self::pattern(
            name,
            &format!(
                r#"id=["']{}["'][^>]*value={QUOTED_VALUE}"#,
                regex::escape(element_id)
            ),
        )
    }

    /// Dropdown state kept in `data-selected-id` on an element carrying `class_name`
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn selected_option(name: &'static str, class_name: &str) -> Result<Self, regex::Error> {
        Self::pattern(
            name,
            &format!(
                r#"class=["'][^"']*{}[^"']*["'][^>]*data-selected-id={QUOTED_VALUE}"#,
                regex::escape(class_name)
            ),
        )
    }

    /// First quoted argument of `handler(...)` inside an `onclick` attribute
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn onclick_argument(name: &'static str, handler: &str) -> Result<Self, regex::Error> {
        Self::pattern(
            name,
            &format!(r#"onclick=["']{}\('([^']+)'"#, regex::escape(handler)),
        )
    }

    /// Try an input's `value` when the previous patterns did not match
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn or_input_value(mut self, input_name: &str) -> Result<Self, regex::Error> {
        self.patterns.push(compile(&input_value_pattern(input_name))?);
        self.patterns
            .push(compile(&input_value_reversed_pattern(input_name))?);
        Ok(self)
    }

    #[must_use]
    pub fn number(mut self, default: f64) -> Self {
        self.kind = FieldKind::Number;
        self.default = FieldValue::Number(default);
        self
    }

    #[must_use]
    pub fn flag(mut self) -> Self {
        self.kind = FieldKind::Flag;
        self.default = FieldValue::Flag(false);
        self
    }

    #[must_use]
    pub fn date(mut self) -> Self {
        self.kind = FieldKind::Date;
        self
    }

    #[must_use]
    pub fn status(mut self) -> Self {
        self.kind = FieldKind::Status;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    /// First non-empty capture across the rule's patterns
    #[must_use]
    pub fn apply(&self, fragment: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(fragment)
                .and_then(|caps| caps.iter().skip(1).flatten().next())
                .map(|m| decode_entities(m.as_str().trim()))
                .filter(|value| !value.is_empty())
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn input_value_pattern(input_name: &str) -> String {
    format!(
        r#"name=["']{}["'][^>]*value={QUOTED_VALUE}"#,
        regex::escape(input_name)
    )
}

fn input_value_reversed_pattern(input_name: &str) -> String {
    format!(
        r#"value={QUOTED_VALUE}[^>]*name=["']{}["']"#,
        regex::escape(input_name)
    )
}

fn build_service_line_rules() -> Result<Vec<FieldRule>, regex::Error> {
    Ok(vec![
        FieldRule::input_value("item", "item[]")?,
        FieldRule::input_value("item_type", "itemTipo[]")?,
        FieldRule::input_value("line_id", "comandaItemId[]")?,
        FieldRule::selected_option("service_id", "sltServico")?,
        FieldRule::selected_option("professional_id", "sltProf")?,
        FieldRule::input_value("quantity", "itemQtde[]")?.number(1.0),
        FieldRule::input_value("unit_price", "itemValor[]")?.number(0.0),
        FieldRule::input_value("discount", "itemDesconto[]")?.number(0.0),
        FieldRule::input_value("total", "itemTotal[]")?.number(0.0),
        FieldRule::input_value("commission", "comissao[]")?.number(0.0),
        FieldRule::input_value("cost", "custo[]")?.number(0.0),
        FieldRule::input_value("reservation_id", "reservaId[]")?,
        FieldRule::input_value("promotion_id", "promocaoId[]")?,
    ])
}

fn build_comanda_rules() -> Result<Vec<FieldRule>, regex::Error> {
    Ok(vec![
        FieldRule::input_value("client_id", "cliente")?,
        FieldRule::element_value("client_name", "nomeCliente")?,
        FieldRule::element_value("date", "dataComanda")?.date(),
        FieldRule::element_value("number", "numeroDaComanda")?,
    ])
}

fn build_client_contact_rules() -> Result<Vec<FieldRule>, regex::Error> {
    Ok(vec![
        FieldRule::input_value("client_id", "id")?,
        FieldRule::element_value("name", "nome")?.or_input_value("nome")?,
        FieldRule::element_value("phone", "celular")?.or_input_value("celularRaw")?,
        FieldRule::input_value("email", "email")?,
        FieldRule::element_value("birthday", "dataNascimento")?,
    ])
}

fn build_client_list_rules() -> Result<Vec<FieldRule>, regex::Error> {
    Ok(vec![
        FieldRule::pattern("email", r"<b>E-mail:\s*</b>\s*([^<\s]+)")?,
        FieldRule::pattern(
            "phone",
            r#"class=["']should-format-phone-number["'][^>]*>\s*(\d+)\s*<"#,
        )?,
    ])
}

// Patterns below are built from escaped literals and cannot fail to compile.
static SERVICE_LINE_RULES: Lazy<Vec<FieldRule>> =
    Lazy::new(|| build_service_line_rules().unwrap());

static COMANDA_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| build_comanda_rules().unwrap());

static CLIENT_CONTACT_RULES: Lazy<Vec<FieldRule>> =
    Lazy::new(|| build_client_contact_rules().unwrap());

static CLIENT_LIST_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| build_client_list_rules().unwrap());

static COMANDA_ID_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::onclick_argument("comanda_id", "financeiroComanda.abrirComanda").unwrap()
});

/// Ordered rule table for an entity type
#[must_use]
pub fn rules_for(kind: EntityKind) -> &'static [FieldRule] {
    match kind {
        EntityKind::ServiceLine => &SERVICE_LINE_RULES,
        EntityKind::Comanda => &COMANDA_RULES,
        EntityKind::ClientContact => &CLIENT_CONTACT_RULES,
        EntityKind::ClientListRow => &CLIENT_LIST_RULES,
    }
}

/// Single-capture rule for the comanda id in the list's action column
#[must_use]
pub fn comanda_id_rule() -> &'static FieldRule {
    &COMANDA_ID_RULE
}
