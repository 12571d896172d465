use proptest::prelude::*;

use sqlmend::lexer::{scan, SpanKind};
use sqlmend::{is_balanced, rebalance, RebalanceOptions};

const FRAGMENTS: &[&str] = &[
    "BEGIN ",
    "END; ",
    "END ",
    "IF x THEN ",
    "END IF; ",
    "ELSIF y THEN ",
    "LOOP ",
    "END LOOP; ",
    "CASE WHEN a THEN b; ",
    "END CASE; ",
    "DO $a$ ",
    "$a$; ",
    "DO $$ ",
    "$$; ",
    "SELECT 1; ",
    "'a literal with END IF; inside' ",
    "'half open ",
    "\"END\" ",
    "-- END of line comment\n",
    "/* BEGIN in a block comment */ ",
    "/* half open ",
    "$q$ BEGIN END nothing matters here $q$ ",
    "$q$ half open ",
];

/// Soups of keyword fragments, literals, comments and junk: most are
/// structurally broken, which is exactly the input the rebalancer exists for.
fn arb_sql() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        5 => prop::sample::select(FRAGMENTS).prop_map(|s| s.to_string()),
        1 => prop::string::string_regex("[A-Za-z0-9_ ;()=]{0,12}").unwrap(),
    ];
    prop::collection::vec(fragment, 0..24).prop_map(|v| v.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn rebalance_is_idempotent(input in arb_sql()) {
        let opt = RebalanceOptions::default();
        let once = rebalance(&input, &opt);
        let twice = rebalance(&once.text, &opt);
        prop_assert_eq!(&twice.text, &once.text);
        prop_assert!(twice.diagnostics.is_empty(),
            "second pass still repaired: {:?}", twice.diagnostics);
    }

    #[test]
    fn rebalance_is_idempotent_with_language_suffix(input in arb_sql()) {
        let opt = RebalanceOptions { append_language: true };
        let once = rebalance(&input, &opt);
        let twice = rebalance(&once.text, &opt);
        prop_assert_eq!(&twice.text, &once.text);
    }

    #[test]
    fn output_is_balanced(input in arb_sql()) {
        let once = rebalance(&input, &RebalanceOptions::default());
        prop_assert!(is_balanced(&once.text));
    }

    #[test]
    fn terminated_dollar_literals_survive_or_are_reported_dropped(input in arb_sql()) {
        let once = rebalance(&input, &RebalanceOptions::default());
        for span in scan(&input) {
            if let SpanKind::Dollar { terminated: true, .. } = span.kind {
                let literal = &input[span.start..span.end];
                let kept = once.text.contains(literal);
                let dropped = once.diagnostics.iter().any(|d| {
                    d.dropped
                        .map(|(start, end)| start <= span.start && span.end <= end)
                        .unwrap_or(false)
                });
                prop_assert!(kept || dropped,
                    "literal {literal:?} vanished without a diagnostic");
            }
        }
    }

    #[test]
    fn diagnostics_offsets_are_in_bounds(input in arb_sql()) {
        let once = rebalance(&input, &RebalanceOptions::default());
        for d in &once.diagnostics {
            prop_assert!(d.offset <= input.len());
            if let Some((start, end)) = d.dropped {
                prop_assert!(start <= end && end <= input.len());
            }
        }
    }
}
