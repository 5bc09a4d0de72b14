//! Literal placeholder substitution for templated campaigns
//!
//! Replacement is a single linear pass over the known placeholder list,
//! not a scan for arbitrary `{...}` tokens. Braces that do not spell a
//! known placeholder name are left untouched, which also makes
//! re-substitution of already-rendered text a no-op.

use serde::Serialize;
use std::collections::HashMap;

/// Rendered output for one personalization row. Ephemeral; consumed by
/// the bulk-send path and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedRow {
    pub subject: String,
    pub body_html: String,

    /// Resolved placeholder name -> value mapping used for this row
    pub mapping: HashMap<String, String>,

    /// All columns of the source row, including non-placeholder ones
    pub row: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Every missing column is reported at once, in placeholder order.
    #[error("missing required columns for template: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Replace every `{name}` occurrence in `text` for each entry of `mapping`.
pub fn substitute(text: &str, mapping: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for (name, value) in mapping {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Render one row against a body and subject template.
///
/// Placeholder names are trimmed before lookup. Fails with the complete
/// list of missing columns if any placeholder has no value in `row`.
pub fn render(
    template: &str,
    subject_template: &str,
    placeholders: &[String],
    row: &HashMap<String, String>,
) -> Result<RenderedRow, TemplateError> {
    let names: Vec<String> = placeholders.iter().map(|p| p.trim().to_string()).collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|name| !row.contains_key(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TemplateError::MissingColumns(missing));
    }

    let mut body = template.to_string();
    let mut subject = subject_template.to_string();
    let mut mapping = HashMap::with_capacity(names.len());

    for name in &names {
        let value = &row[name.as_str()];
        let token = format!("{{{name}}}");
        body = body.replace(&token, value);
        subject = subject.replace(&token, value);
        mapping.insert(name.clone(), value.clone());
    }

    Ok(RenderedRow {
        subject,
        body_html: body,
        mapping,
        row: row.clone(),
    })
}

/// Render a whole table of rows, validating the placeholder list against
/// the table's column set up front so a missing column is reported once
/// rather than per row.
pub fn render_rows(
    template: &str,
    subject_template: &str,
    placeholders: &[String],
    columns: &[String],
    rows: &[HashMap<String, String>],
) -> Result<Vec<RenderedRow>, TemplateError> {
    let names: Vec<String> = placeholders.iter().map(|p| p.trim().to_string()).collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|name| !columns.iter().any(|c| c == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TemplateError::MissingColumns(missing));
    }

    rows.iter()
        .map(|row| render(template, subject_template, &names, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn renders_body_and_subject() {
        let rendered = render(
            "Dear {Name}, welcome to {Company}.",
            "Welcome, {Name}!",
            &names(&["Name", "Company"]),
            &row(&[("Name", "Alice"), ("Company", "Acme")]),
        )
        .unwrap();

        assert_eq!(rendered.body_html, "Dear Alice, welcome to Acme.");
        assert_eq!(rendered.subject, "Welcome, Alice!");
        assert_eq!(rendered.mapping["Name"], "Alice");
        assert_eq!(rendered.mapping["Company"], "Acme");
    }

    #[test]
    fn reports_all_missing_columns_at_once() {
        let err = render(
            "Hi {Name} of {Company} in {Location}",
            "{Name}",
            &names(&["Name", "Company", "Location"]),
            &row(&[("Name", "Alice")]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            TemplateError::MissingColumns(vec!["Company".into(), "Location".into()])
        );
        assert!(err.to_string().contains("Company"));
        assert!(err.to_string().contains("Location"));
    }

    #[test]
    fn placeholder_names_are_trimmed() {
        let rendered = render(
            "Hi {Name}",
            "{Name}",
            &names(&[" Name "]),
            &row(&[("Name", "Bob")]),
        )
        .unwrap();

        assert_eq!(rendered.body_html, "Hi Bob");
    }

    #[test]
    fn unknown_braces_are_left_alone() {
        let rendered = render(
            "Hi {Name}, see {fig. 2} and {Other}",
            "{Name}",
            &names(&["Name"]),
            &row(&[("Name", "Bob"), ("Other", "ignored")]),
        )
        .unwrap();

        // Only declared placeholders are substituted.
        assert_eq!(rendered.body_html, "Hi Bob, see {fig. 2} and {Other}");
    }

    #[test]
    fn substitution_is_idempotent_on_rendered_text() {
        let mapping = row(&[("Name", "Alice")]);
        let once = substitute("Hello {Name}", &mapping);
        let twice = substitute(&once, &mapping);
        assert_eq!(once, "Hello Alice");
        assert_eq!(once, twice);
    }

    #[test]
    fn render_rows_validates_against_columns() {
        let err = render_rows(
            "Hi {Name}",
            "{Name}",
            &names(&["Name", "Company"]),
            &names(&["Name", "Email"]),
            &[row(&[("Name", "Alice"), ("Email", "a@example.com")])],
        )
        .unwrap_err();

        assert_eq!(err, TemplateError::MissingColumns(vec!["Company".into()]));
    }

    #[test]
    fn render_rows_preserves_row_order() {
        let rows = vec![
            row(&[("Name", "Alice"), ("Email", "a@example.com")]),
            row(&[("Name", "Bob"), ("Email", "b@example.com")]),
        ];
        let rendered = render_rows(
            "Hi {Name}",
            "For {Name}",
            &names(&["Name"]),
            &names(&["Name", "Email"]),
            &rows,
        )
        .unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].body_html, "Hi Alice");
        assert_eq!(rendered[1].body_html, "Hi Bob");
        // Non-placeholder columns pass through.
        assert_eq!(rendered[1].row["Email"], "b@example.com");
    }
}
