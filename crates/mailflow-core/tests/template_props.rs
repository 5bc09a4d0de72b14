//! Property-based tests for the template renderer.

use proptest::prelude::*;
use std::collections::HashMap;

use mailflow_core::{render, substitute, TemplateError};

/// Placeholder names: word characters only, so tokens are unambiguous.
fn placeholder_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,15}"
}

/// Values free of braces, so substituted output cannot form new tokens.
fn plain_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 .,!?-]{0,30}"
}

fn distinct_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(placeholder_name(), 1..=max)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// When every placeholder has a value, no `{name}` token survives
    /// rendering.
    #[test]
    fn rendering_consumes_every_known_token(
        names in distinct_names(5),
        values in prop::collection::vec(plain_value(), 5),
        filler in "[A-Za-z ]{0,20}",
    ) {
        let row: HashMap<String, String> = names
            .iter()
            .cloned()
            .zip(values.into_iter().cycle())
            .collect();

        let template: String = names
            .iter()
            .map(|n| format!("{filler}{{{n}}}"))
            .collect();
        let subject = format!("{{{}}}", names[0]);

        let rendered = render(&template, &subject, &names, &row).unwrap();
        for name in &names {
            let token = format!("{{{name}}}");
            prop_assert!(!rendered.body_html.contains(&token));
            prop_assert!(!rendered.subject.contains(&token));
        }
    }

    /// Every absent column is named in the error, and nothing else is.
    #[test]
    fn missing_columns_are_reported_completely(
        names in distinct_names(6),
        present_count in 0usize..6,
    ) {
        prop_assume!(present_count < names.len());

        let row: HashMap<String, String> = names
            .iter()
            .take(present_count)
            .map(|n| (n.clone(), "value".to_string()))
            .collect();

        let result = render("body", "subject", &names, &row);
        let expected: Vec<String> = names.iter().skip(present_count).cloned().collect();
        prop_assert_eq!(result, Err(TemplateError::MissingColumns(expected)));
    }

    /// Substituting a second time over token-free output is a no-op.
    #[test]
    fn resubstitution_is_idempotent(
        names in distinct_names(4),
        values in prop::collection::vec(plain_value(), 4),
        filler in "[A-Za-z ]{0,20}",
    ) {
        let mapping: HashMap<String, String> = names
            .iter()
            .cloned()
            .zip(values.into_iter().cycle())
            .collect();

        let template: String = names
            .iter()
            .map(|n| format!("{filler}{{{n}}}"))
            .collect();

        let once = substitute(&template, &mapping);
        let twice = substitute(&once, &mapping);
        prop_assert_eq!(once, twice);
    }

    /// Text without any known token passes through untouched.
    #[test]
    fn token_free_text_is_untouched(
        names in distinct_names(3),
        text in "[A-Za-z0-9 .,]{0,60}",
    ) {
        let mapping: HashMap<String, String> = names
            .iter()
            .map(|n| (n.clone(), "value".to_string()))
            .collect();
        prop_assert_eq!(substitute(&text, &mapping), text);
    }
}
