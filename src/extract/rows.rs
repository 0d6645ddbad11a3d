//! Row segmentation
//!
//! A row starts at each occurrence of the row marker and runs until the next
//! row marker, the end-of-container marker, or the end of the fragment,
//! whichever comes first. Unterminated markup yields a partial last row.

use regex::{Regex, RegexBuilder};

use crate::error::PortalError;

#[derive(Debug, Clone)]
pub struct RowBoundary {
    start: Regex,
    end_marker: String,
    container_marker: Option<String>,
}

impl RowBoundary {
    /// Rows start where `start_pattern` matches and stop at `end_marker`
    ///
    /// # Errors
    ///
    /// Returns an error if `start_pattern` is not a valid regular expression.
    pub fn new(start_pattern: &str, end_marker: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            start: RegexBuilder::new(start_pattern)
                .case_insensitive(true)
                .build()?,
            end_marker: end_marker.to_ascii_lowercase(),
            container_marker: None,
        })
    }

    /// `<tr>` elements carrying `class_name`, closed by `</tbody>`
    ///
    /// # Errors
    ///
    /// Returns an error if the generated expression fails to compile.
    pub fn table_rows_with_class(class_name: &str) -> Result<Self, regex::Error> {
        Self::new(
            &format!(
                r#"<tr[^>]*class=["'][^"']*\b{}\b[^"']*["'][^>]*>"#,
                regex::escape(class_name)
            ),
            "</tbody>",
        )
    }

    /// Marker whose absence makes [`RowBoundary::require`] fail
    #[must_use]
    pub fn with_container(mut self, marker: &str) -> Self {
        self.container_marker = Some(marker.to_ascii_lowercase());
        self
    }

    /// Split `fragment` into row fragments, zero rows when no marker matches
    #[must_use]
    pub fn segment<'a>(&self, fragment: &'a str) -> Vec<&'a str> {
        // ASCII lowercasing keeps byte offsets aligned with `fragment`
        let lowered = fragment.to_ascii_lowercase();
        let starts: Vec<(usize, usize)> = self
            .start
            .find_iter(fragment)
            .map(|m| (m.start(), m.end()))
            .collect();

        starts
            .iter()
            .enumerate()
            .map(|(i, &(row_start, tag_end))| {
                let next_row = starts.get(i + 1).map_or(fragment.len(), |&(s, _)| s);
                let container_end = lowered[tag_end..]
                    .find(&self.end_marker)
                    .map_or(fragment.len(), |offset| tag_end + offset);
                &fragment[row_start..next_row.min(container_end)]
            })
            .collect()
    }

    /// Like [`RowBoundary::segment`] but fails when the container marker is absent
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::ExtractionFailure`] when the configured container
    /// marker does not occur in `fragment`.
    pub fn require<'a>(&self, fragment: &'a str) -> Result<Vec<&'a str>, PortalError> {
        if let Some(marker) = &self.container_marker {
            if !fragment.to_ascii_lowercase().contains(marker.as_str()) {
                return Err(PortalError::ExtractionFailure(format!(
                    "container marker '{marker}' not found"
                )));
            }
        }
        Ok(self.segment(fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary() -> RowBoundary {
        RowBoundary::table_rows_with_class("itemComanda")
            .unwrap()
            .with_container("<tbody")
    }

    fn row(n: usize) -> String {
        format!("<tr id='linha{n}' class='itemComanda'><td><input name=\"item[]\" value=\"{n}\"></td></tr>")
    }

    #[test]
    fn test_n_rows_yield_n_segments() {
        let html = format!(
            "<table><tbody>{}{}{}</tbody><tfoot><tr class='total'></tr></tfoot></table>",
            row(1),
            row(2),
            row(3)
        );
        let rows = boundary().segment(&html);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("value=\"1\""));
        assert!(rows[2].contains("value=\"3\""));
        assert!(!rows[2].contains("tfoot"));
    }

    #[test]
    fn test_truncated_last_row_is_partial() {
        let html = format!("<tbody>{}{}<tr id='linha3' class='itemComanda'><td><inp", row(1), row(2));
        let rows = boundary().segment(&html);
        assert_eq!(rows.len(), 3);
        assert!(rows[2].ends_with("<inp"));
    }

    #[test]
    fn test_no_markers_yield_zero_rows() {
        assert!(boundary().segment("<p>nothing here</p>").is_empty());
        assert!(boundary().segment("").is_empty());
    }

    #[test]
    fn test_class_must_match_whole_word() {
        let html = "<tbody><tr class='itemComandaTotal'></tr></tbody>";
        assert!(boundary().segment(html).is_empty());
    }

    #[test]
    fn test_missing_container_is_extraction_failure() {
        let err = boundary().require("<div>no table</div>").unwrap_err();
        assert!(matches!(err, PortalError::ExtractionFailure(_)));

        let html = format!("<TBODY>{}</TBODY>", row(1));
        let ok = boundary().require(&html).unwrap();
        assert_eq!(ok.len(), 1);
    }
}
