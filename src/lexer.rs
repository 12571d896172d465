#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    If,
    Then,
    Elsif,
    Else,
    Loop,
    Case,
    When,
    Begin,
    End,
    Do,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    Plain,
    LineComment,
    BlockComment { terminated: bool },
    /// Single-quoted string literal; `''` is an escaped quote.
    Str { terminated: bool },
    /// Double-quoted identifier; `""` is an escaped quote.
    QuotedIdent { terminated: bool },
    /// Atomic dollar-quoted literal, opener through the byte-identical closer.
    Dollar { tag: String, terminated: bool },
    /// `$tag$` delimiter opening a DO body.
    BodyOpen { tag: String },
    /// `$tag$` delimiter closing the innermost open DO body.
    BodyClose { tag: String },
    Keyword(Kw),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_ws(&self, source: &str) -> bool {
        self.kind == SpanKind::Plain && self.text(source).bytes().all(|b| b.is_ascii_whitespace())
    }

    /// Whitespace-only plain text or a comment: spans the stack walk skips over.
    pub fn is_skippable(&self, source: &str) -> bool {
        matches!(
            self.kind,
            SpanKind::LineComment | SpanKind::BlockComment { .. }
        ) || self.is_ws(source)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword(word: &str) -> Option<Kw> {
    if word.len() > 5 {
        return None;
    }
    match word.to_ascii_lowercase().as_str() {
        "if" => Some(Kw::If),
        "then" => Some(Kw::Then),
        "elsif" => Some(Kw::Elsif),
        "else" => Some(Kw::Else),
        "loop" => Some(Kw::Loop),
        "case" => Some(Kw::Case),
        "when" => Some(Kw::When),
        "begin" => Some(Kw::Begin),
        "end" => Some(Kw::End),
        "do" => Some(Kw::Do),
        _ => None,
    }
}

fn read_quoted(bytes: &[u8], start: usize, quote: u8) -> (usize, bool) {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return (i + 1, true);
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// `$` + zero or more `[A-Za-z0-9_]` + `$`; returns (end, tag) when present.
fn read_dollar_delim(text: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && is_word_byte(bytes[i]) {
        i += 1;
    }
    if bytes.get(i) == Some(&b'$') {
        Some((i + 1, &text[start + 1..i]))
    } else {
        None
    }
}

fn flush_plain(spans: &mut Vec<Span>, plain_start: &mut Option<usize>, end: usize) {
    if let Some(start) = plain_start.take() {
        if start < end {
            spans.push(Span {
                kind: SpanKind::Plain,
                start,
                end,
            });
        }
    }
}

/// Tokenize `text` into an ordered, contiguous span sequence covering the
/// whole input. Pure; never fails on malformed input. Unterminated
/// constructs extend to end of input and carry a `terminated: false` flag.
pub fn scan(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans: Vec<Span> = Vec::new();
    let mut plain_start: Option<usize> = None;
    // Innermost-first tags of DO bodies whose close delimiter is still ahead.
    let mut body_tags: Vec<String> = Vec::new();
    // A DO keyword was seen and only whitespace/comments followed so far.
    let mut pending_do = false;
    let mut i: usize = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            flush_plain(&mut spans, &mut plain_start, i);
            let start = i;
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            spans.push(Span {
                kind: SpanKind::LineComment,
                start,
                end: i,
            });
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            flush_plain(&mut spans, &mut plain_start, i);
            let start = i;
            i += 2;
            let mut terminated = false;
            while i < bytes.len() {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 2;
                    terminated = true;
                    break;
                }
                i += 1;
            }
            spans.push(Span {
                kind: SpanKind::BlockComment { terminated },
                start,
                end: i,
            });
            continue;
        }

        if b == b'\'' || b == b'"' {
            flush_plain(&mut spans, &mut plain_start, i);
            let start = i;
            let (end, terminated) = read_quoted(bytes, i, b);
            let kind = if b == b'\'' {
                SpanKind::Str { terminated }
            } else {
                SpanKind::QuotedIdent { terminated }
            };
            spans.push(Span { kind, start, end });
            i = end;
            pending_do = false;
            continue;
        }

        if b == b'$' {
            if let Some((delim_end, tag)) = read_dollar_delim(text, i) {
                flush_plain(&mut spans, &mut plain_start, i);
                let start = i;
                if pending_do {
                    body_tags.push(tag.to_string());
                    spans.push(Span {
                        kind: SpanKind::BodyOpen {
                            tag: tag.to_string(),
                        },
                        start,
                        end: delim_end,
                    });
                    i = delim_end;
                    pending_do = false;
                    continue;
                }
                if body_tags.last().map(String::as_str) == Some(tag) {
                    body_tags.pop();
                    spans.push(Span {
                        kind: SpanKind::BodyClose {
                            tag: tag.to_string(),
                        },
                        start,
                        end: delim_end,
                    });
                    i = delim_end;
                    continue;
                }
                // Atomic literal: runs to the next byte-identical delimiter.
                let delim = &text[start..delim_end];
                let (end, terminated) = match text[delim_end..].find(delim) {
                    Some(rel) => (delim_end + rel + delim.len(), true),
                    None => (bytes.len(), false),
                };
                spans.push(Span {
                    kind: SpanKind::Dollar {
                        tag: tag.to_string(),
                        terminated,
                    },
                    start,
                    end,
                });
                i = end;
                pending_do = false;
                continue;
            }
            // Lone `$` (e.g. a positional parameter): plain text.
            if plain_start.is_none() {
                plain_start = Some(i);
            }
            i += 1;
            pending_do = false;
            continue;
        }

        if is_word_byte(b) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            match keyword(&text[start..i]) {
                Some(kw) => {
                    flush_plain(&mut spans, &mut plain_start, start);
                    pending_do = kw == Kw::Do;
                    spans.push(Span {
                        kind: SpanKind::Keyword(kw),
                        start,
                        end: i,
                    });
                }
                None => {
                    if plain_start.is_none() {
                        plain_start = Some(start);
                    }
                    pending_do = false;
                }
            }
            continue;
        }

        if plain_start.is_none() {
            plain_start = Some(i);
        }
        if !b.is_ascii_whitespace() {
            pending_do = false;
        }
        i += 1;
    }

    flush_plain(&mut spans, &mut plain_start, bytes.len());
    spans
}
