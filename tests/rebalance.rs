use pretty_assertions::assert_eq;

use sqlmend::{is_balanced, rebalance, DiagnosticKind, FrameKind, RebalanceOptions};

fn run(text: &str) -> sqlmend::Rebalanced {
    rebalance(text, &RebalanceOptions::default())
}

#[test]
fn balanced_do_block_is_untouched() {
    let input = "DO $$ BEGIN IF true THEN NULL; END IF; END $$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn missing_end_if_is_synthesized_before_body_close() {
    let r = run("DO $$ BEGIN IF true THEN NULL; END $$;");
    assert_eq!(r.text, "DO $$ BEGIN IF true THEN NULL; END IF;\nEND $$;");
    assert_eq!(r.diagnostics.len(), 1);
    assert_eq!(r.diagnostics[0].kind, DiagnosticKind::UnclosedFrame);
    assert_eq!(r.diagnostics[0].frame, Some(FrameKind::If));
}

#[test]
fn orphan_end_is_dropped() {
    let r = run("BEGIN NULL; END; END;");
    assert_eq!(r.text, "BEGIN NULL; END; ");
    assert_eq!(r.diagnostics.len(), 1);
    assert_eq!(r.diagnostics[0].kind, DiagnosticKind::OrphanCloser);
    assert_eq!(r.diagnostics[0].frame, Some(FrameKind::Begin));
    assert!(r.diagnostics[0].dropped.is_some());
}

#[test]
fn mismatched_dollar_tag_leaves_frame_open_to_eof() {
    let r = run("DO $a$ BEGIN NULL; END $b$;");
    assert_eq!(r.text, "DO $a$ BEGIN NULL; END $a$;\n");
    let kinds: Vec<DiagnosticKind> = r.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![DiagnosticKind::OrphanCloser, DiagnosticKind::UnclosedFrame]
    );
    assert_eq!(
        r.diagnostics[1].frame,
        Some(FrameKind::DoTagged("a".to_string()))
    );
}

#[test]
fn keywords_inside_string_literal_do_not_bleed() {
    let input = "DO $$ BEGIN SELECT 'text with END IF; inside'; END $$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn keywords_inside_dollar_literal_do_not_bleed() {
    let input = "SELECT $q$ BEGIN END LOOP; $q$ FROM t;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn keywords_in_quoted_identifier_and_comments_do_not_bleed() {
    let input = "SELECT \"END\" FROM t; -- END of line\n/* BEGIN block */";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn loop_and_case_closers_match() {
    let input = "DO $$ BEGIN LOOP EXIT; END LOOP; CASE WHEN a THEN b; END CASE; END $$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn keywords_are_case_insensitive() {
    let input = "do $$ begin if x then null; end if; end $$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn non_top_match_is_treated_as_unmatched() {
    // The IF is still open when END IF arrives with a BEGIN on top; the
    // deeper match is not force-closed, the closer is dropped instead.
    let r = run("IF a THEN BEGIN END IF;");
    assert_eq!(r.text, "IF a THEN BEGIN END;\nEND IF;\n");
    assert_eq!(r.diagnostics.len(), 3);
    assert_eq!(r.diagnostics[0].kind, DiagnosticKind::OrphanCloser);
    assert!(r.diagnostics[0]
        .note
        .as_deref()
        .unwrap_or_default()
        .contains("deeper"));
}

#[test]
fn unclosed_frames_are_closed_in_lifo_order() {
    let r = run("BEGIN IF a THEN LOOP x;");
    assert_eq!(r.text, "BEGIN IF a THEN LOOP x;\nEND LOOP;\nEND IF;\nEND;\n");
    let frames: Vec<Option<FrameKind>> = r.diagnostics.iter().map(|d| d.frame.clone()).collect();
    assert_eq!(
        frames,
        vec![
            Some(FrameKind::Loop),
            Some(FrameKind::If),
            Some(FrameKind::Begin)
        ]
    );
}

#[test]
fn nested_do_bodies_with_distinct_tags_pair_strictly() {
    let input = "DO $outer$ BEGIN DO $inner$ BEGIN NULL; END $inner$; END $outer$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn outer_close_never_satisfies_inner_body() {
    // The $o$ close arrives while $i$ is still open: strict LIFO drops it
    // and both bodies are closed in order at end of input.
    let r = run("DO $o$ BEGIN DO $i$ BEGIN NULL; END $o$;");
    assert_eq!(r.text, "DO $o$ BEGIN DO $i$ BEGIN NULL; END $i$;\nEND $o$;\n");
    let kinds: Vec<DiagnosticKind> = r.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::OrphanCloser,
            DiagnosticKind::UnclosedFrame,
            DiagnosticKind::UnclosedFrame,
        ]
    );
}

#[test]
fn unterminated_string_is_closed_before_synthesized_closers() {
    let r = run("BEGIN 'oops");
    assert_eq!(r.text, "BEGIN 'oops'\nEND;\n");
    let kinds: Vec<DiagnosticKind> = r.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::UnterminatedString,
            DiagnosticKind::UnclosedFrame
        ]
    );
}

#[test]
fn unterminated_block_comment_is_closed_before_synthesized_closers() {
    let r = run("BEGIN /* note");
    assert_eq!(r.text, "BEGIN /* note*/\nEND;\n");
    assert_eq!(r.diagnostics[0].kind, DiagnosticKind::UnterminatedComment);
}

#[test]
fn unterminated_dollar_quote_swallows_the_tail() {
    let r = run("DO $a$ BEGIN SELECT $x$ oops");
    assert_eq!(r.text, "DO $a$ BEGIN SELECT $x$ oops$x$\nEND $a$;\n");
    let kinds: Vec<DiagnosticKind> = r.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::UnterminatedDollarQuote,
            DiagnosticKind::UnclosedFrame
        ]
    );
}

#[test]
fn closer_after_trailing_line_comment_lands_on_its_own_line() {
    let r = run("BEGIN x; -- trailing");
    assert_eq!(r.text, "BEGIN x; -- trailing\nEND;\n");
}

#[test]
fn append_language_marks_the_outermost_body_close() {
    let opt = RebalanceOptions {
        append_language: true,
    };
    let r = rebalance("DO $a$ BEGIN NULL;", &opt);
    assert_eq!(r.text, "DO $a$ BEGIN NULL;\nEND $a$ LANGUAGE plpgsql;\n");
}

#[test]
fn do_body_without_begin_still_pairs() {
    let input = "DO $a$ SELECT 1; $a$;";
    let r = run(input);
    assert_eq!(r.text, input);
    assert_eq!(r.diagnostics, vec![]);
}

#[test]
fn scenario_outputs_are_fixpoints() {
    for input in [
        "DO $$ BEGIN IF true THEN NULL; END $$;",
        "BEGIN NULL; END; END;",
        "DO $a$ BEGIN NULL; END $b$;",
        "IF a THEN BEGIN END IF;",
        "BEGIN 'oops",
        "DO $o$ BEGIN DO $i$ BEGIN NULL; END $o$;",
    ] {
        let once = run(input);
        let twice = run(&once.text);
        assert_eq!(twice.text, once.text, "not idempotent for {input:?}");
        assert_eq!(twice.diagnostics, vec![], "residue for {input:?}");
        assert!(is_balanced(&once.text));
    }
}
