use crate::lexer::{scan, Kw, Span, SpanKind};

/// True when the text contains the keyword sequence
/// `CREATE [OR REPLACE] FUNCTION` outside comments and literals.
pub fn contains_create_function(text: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Idle,
        Create,
        CreateOr,
        CreateOrReplace,
    }
    let mut state = State::Idle;
    for span in scan(text) {
        match span.kind {
            SpanKind::LineComment | SpanKind::BlockComment { .. } => {}
            SpanKind::Plain => {
                let s = span.text(text);
                let bytes = s.as_bytes();
                let mut i = 0;
                while i < bytes.len() {
                    let b = bytes[i];
                    if b.is_ascii_alphanumeric() || b == b'_' {
                        let start = i;
                        while i < bytes.len()
                            && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                        {
                            i += 1;
                        }
                        let word = &s[start..i];
                        state = match (state, word.to_ascii_lowercase().as_str()) {
                            (_, "create") => State::Create,
                            (State::Create, "or") => State::CreateOr,
                            (State::CreateOr, "replace") => State::CreateOrReplace,
                            (State::Create, "function") | (State::CreateOrReplace, "function") => {
                                return true;
                            }
                            _ => State::Idle,
                        };
                    } else {
                        if !b.is_ascii_whitespace() {
                            state = State::Idle;
                        }
                        i += 1;
                    }
                }
            }
            _ => state = State::Idle,
        }
    }
    false
}

/// True when the first significant token of the text is a DO keyword: the
/// block is already a DO statement and re-wrapping it would nest DO inside
/// DO, which Postgres rejects.
pub fn starts_with_do(text: &str) -> bool {
    scan(text)
        .iter()
        .find(|s| !s.is_skippable(text))
        .map(|s| s.kind == SpanKind::Keyword(Kw::Do))
        .unwrap_or(false)
}

fn pick_wrap_tag(body: &str) -> String {
    if !body.contains("$wrap$") {
        return "wrap".to_string();
    }
    let mut n = 1u32;
    loop {
        let tag = format!("wrap{n}");
        if !body.contains(&format!("${tag}$")) {
            return tag;
        }
        n += 1;
    }
}

/// Wrap a statement body in the canonical anonymous-block envelope. The tag
/// is `wrap` unless the body already contains that delimiter.
pub fn wrap_do(body: &str) -> String {
    let tag = pick_wrap_tag(body);
    let body = body.trim_end_matches('\n');
    format!("DO ${tag}$\nBEGIN\n{body}\nEND ${tag}$ LANGUAGE plpgsql;\n")
}

/// Normalize `END $tag$;` body closes that lack a `LANGUAGE` clause to
/// `END $tag$ LANGUAGE plpgsql;`. Returns the rewritten text and how many
/// closes were rewritten.
pub fn ensure_language(text: &str) -> (String, usize) {
    let spans = scan(text);
    let mut out = String::with_capacity(text.len() + 32);
    let mut count = 0usize;
    let mut idx = 0usize;

    let next_significant = |from: usize| {
        let mut j = from;
        while j < spans.len() && spans[j].is_skippable(text) {
            j += 1;
        }
        (j < spans.len()).then_some(j)
    };

    while idx < spans.len() {
        let span: &Span = &spans[idx];
        if span.kind == SpanKind::Keyword(Kw::End) {
            if let Some(j) = next_significant(idx + 1) {
                if let SpanKind::BodyClose { .. } = spans[j].kind {
                    // `END $tag$` followed by `;` and no LANGUAGE clause.
                    if let Some((semi_len, follows)) =
                        semi_prefix(spans.get(j + 1), text)
                    {
                        if !follows_language(follows) {
                            out.push_str(&text[span.start..spans[j].end]);
                            out.push_str(" LANGUAGE plpgsql;");
                            let rest_start = spans[j + 1].start + semi_len;
                            out.push_str(&text[rest_start..spans[j + 1].end]);
                            count += 1;
                            idx = j + 2;
                            continue;
                        }
                    }
                    out.push_str(&text[span.start..spans[j].end]);
                    idx = j + 1;
                    continue;
                }
            }
        }
        out.push_str(span.text(text));
        idx += 1;
    }
    (out, count)
}

/// Leading `[ \t]*;` of a plain span, as (prefix length, remainder).
fn semi_prefix<'a>(span: Option<&Span>, text: &'a str) -> Option<(usize, &'a str)> {
    let span = span?;
    if span.kind != SpanKind::Plain {
        return None;
    }
    let s = span.text(text);
    let ws = s.len() - s.trim_start_matches([' ', '\t']).len();
    let rest = &s[ws..];
    let rest = rest.strip_prefix(';')?;
    Some((ws + 1, rest))
}

fn follows_language(rest: &str) -> bool {
    let word: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    word.eq_ignore_ascii_case("language")
}
