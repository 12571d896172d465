use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lexer::{scan, Kw, Span, SpanKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    If,
    Loop,
    Case,
    Begin,
    DoTagged(String),
}

impl FrameKind {
    fn closer(&self) -> String {
        match self {
            FrameKind::If => "END IF;".to_string(),
            FrameKind::Loop => "END LOOP;".to_string(),
            FrameKind::Case => "END CASE;".to_string(),
            FrameKind::Begin => "END;".to_string(),
            FrameKind::DoTagged(tag) => format!("END ${tag}$;"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A closer with no corresponding open frame was dropped.
    OrphanCloser,
    /// A frame was still open and its canonical closer was synthesized.
    UnclosedFrame,
    UnterminatedDollarQuote,
    UnterminatedString,
    UnterminatedIdent,
    UnterminatedComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Byte offset in the input text.
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameKind>,
    /// Byte range removed from the output, for drops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            frame: None,
            dropped: None,
            note: None,
        }
    }

    pub fn is_repair(&self) -> bool {
        matches!(
            self.kind,
            DiagnosticKind::OrphanCloser | DiagnosticKind::UnclosedFrame
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RebalanceOptions {
    /// Synthesized closer for the outermost DO body carries the
    /// `LANGUAGE plpgsql` suffix used by the wrapping convention.
    pub append_language: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rebalanced {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    offset: usize,
    /// A BEGIN that directly opens a DO body; its explicit END merges with
    /// the body-close delimiter.
    envelope: bool,
}

fn strip_leading_semi(s: &str) -> &str {
    let trimmed = s.trim_start_matches([' ', '\t']);
    match trimmed.strip_prefix(';') {
        Some(rest) => rest,
        None => s,
    }
}

/// Append a synthesized closer, breaking the line when the output does not
/// already end in whitespace (a trailing line comment would otherwise swallow
/// it on the next pass).
fn push_closer(out: &mut String, closer: &str) {
    if !out.is_empty() && !out.ends_with(|c: char| c.is_ascii_whitespace()) {
        out.push('\n');
    }
    out.push_str(closer);
    out.push('\n');
}

fn unterminated_diag(span: &Span) -> Option<Diagnostic> {
    let (kind, what) = match &span.kind {
        SpanKind::Str { terminated: false } => (DiagnosticKind::UnterminatedString, "string"),
        SpanKind::QuotedIdent { terminated: false } => {
            (DiagnosticKind::UnterminatedIdent, "identifier")
        }
        SpanKind::BlockComment { terminated: false } => {
            (DiagnosticKind::UnterminatedComment, "comment")
        }
        SpanKind::Dollar {
            terminated: false, ..
        } => (DiagnosticKind::UnterminatedDollarQuote, "dollar quote"),
        _ => return None,
    };
    let mut d = Diagnostic::new(kind, span.start);
    d.note = Some(format!("unterminated {what} runs to end of input"));
    Some(d)
}

/// Terminator to append at end of input so that synthesized closers stay
/// outside the open construct on the next pass.
fn tail_terminator(span: &Span) -> Option<String> {
    match &span.kind {
        SpanKind::Str { terminated: false } => Some("'".to_string()),
        SpanKind::QuotedIdent { terminated: false } => Some("\"".to_string()),
        SpanKind::BlockComment { terminated: false } => Some("*/".to_string()),
        SpanKind::Dollar {
            tag,
            terminated: false,
        } => Some(format!("${tag}$")),
        _ => None,
    }
}

struct Rebalancer<'a> {
    text: &'a str,
    spans: Vec<Span>,
    out: String,
    diagnostics: Vec<Diagnostic>,
    stack: Vec<Frame>,
    expect_envelope: bool,
    strip_semi: bool,
    append_language: bool,
    /// Terminator for an emitted trailing unterminated construct.
    tail_open: Option<String>,
}

impl<'a> Rebalancer<'a> {
    fn new(text: &'a str, opt: &RebalanceOptions) -> Self {
        Self {
            text,
            spans: scan(text),
            out: String::with_capacity(text.len() + 32),
            diagnostics: Vec::new(),
            stack: Vec::new(),
            expect_envelope: false,
            strip_semi: false,
            append_language: opt.append_language,
            tail_open: None,
        }
    }

    fn emit(&mut self, span: &Span) {
        self.out.push_str(span.text(self.text));
    }

    fn push_frame(&mut self, kind: FrameKind, offset: usize, envelope: bool) {
        self.stack.push(Frame {
            kind,
            offset,
            envelope,
        });
    }

    /// Suffix lookahead for an END: the next significant span, if any.
    fn lookahead(&self, from: usize) -> Option<usize> {
        let mut j = from;
        while j < self.spans.len() && self.spans[j].is_skippable(self.text) {
            j += 1;
        }
        (j < self.spans.len()).then_some(j)
    }

    fn innermost_do(&self, tag: &str) -> Option<usize> {
        self.stack
            .iter()
            .rposition(|f| matches!(&f.kind, FrameKind::DoTagged(t) if t == tag))
    }

    /// Close every frame above `pos`, synthesizing canonical closers. With
    /// `explicit_end`, the body close is preceded by an END token, which
    /// itself closes a directly enclosed envelope BEGIN.
    fn close_down_to(&mut self, pos: usize, at: usize, explicit_end: bool) {
        while self.stack.len() > pos + 1 {
            let frame = self.stack.pop().expect("frames above pos");
            if explicit_end && frame.envelope && self.stack.len() == pos + 1 {
                // The explicit END is this BEGIN's closer.
                continue;
            }
            debug!(
                offset = at,
                frame = ?frame.kind,
                "synthesizing closer for frame left open inside DO body"
            );
            let closer = frame.kind.closer();
            push_closer(&mut self.out, &closer);
            let mut d = Diagnostic::new(DiagnosticKind::UnclosedFrame, at);
            d.frame = Some(frame.kind);
            d.note = Some("closed before the body-close delimiter".to_string());
            self.diagnostics.push(d);
        }
        self.stack.pop();
    }

    fn drop_orphan(&mut self, required: FrameKind, start: usize, end: usize, note: Option<String>) {
        debug!(offset = start, frame = ?required, "dropping orphan closer");
        let mut d = Diagnostic::new(DiagnosticKind::OrphanCloser, start);
        d.frame = Some(required);
        d.dropped = Some((start, end));
        d.note = note;
        self.diagnostics.push(d);
        self.strip_semi = true;
    }

    /// Handle an END keyword at span index `idx`; returns the next index.
    fn handle_end(&mut self, idx: usize) -> usize {
        let end_span = self.spans[idx].clone();
        let suffix_idx = self.lookahead(idx + 1);
        let suffix = suffix_idx.map(|j| &self.spans[j]);

        enum Suffix {
            Kw(FrameKind),
            Close(String),
            Literal(String, bool),
            Bare,
        }
        let suffix_kind = match suffix.map(|s| &s.kind) {
            Some(SpanKind::Keyword(Kw::If)) => Suffix::Kw(FrameKind::If),
            Some(SpanKind::Keyword(Kw::Loop)) => Suffix::Kw(FrameKind::Loop),
            Some(SpanKind::Keyword(Kw::Case)) => Suffix::Kw(FrameKind::Case),
            Some(SpanKind::BodyClose { tag }) => Suffix::Close(tag.clone()),
            Some(SpanKind::Dollar { tag, terminated }) => Suffix::Literal(tag.clone(), *terminated),
            _ => Suffix::Bare,
        };

        match suffix_kind {
            Suffix::Kw(required) => {
                let j = suffix_idx.expect("keyword suffix has an index");
                let suffix_end = self.spans[j].end;
                if self.stack.last().map(|f| &f.kind) == Some(&required) {
                    self.stack.pop();
                    self.out.push_str(&self.text[end_span.start..suffix_end]);
                } else {
                    let deeper = self.stack.iter().any(|f| f.kind == required);
                    let note = deeper.then(|| {
                        "a matching frame is open deeper in the stack; \
                         conservatively treated as unmatched"
                            .to_string()
                    });
                    self.drop_orphan(required, end_span.start, suffix_end, note);
                }
                j + 1
            }
            Suffix::Close(tag) => {
                let j = suffix_idx.expect("close suffix has an index");
                let suffix_end = self.spans[j].end;
                match self.innermost_do(&tag) {
                    Some(pos) => {
                        self.close_down_to(pos, end_span.start, true);
                        self.out.push_str(&self.text[end_span.start..suffix_end]);
                    }
                    None => {
                        self.drop_orphan(FrameKind::DoTagged(tag), end_span.start, suffix_end, None);
                    }
                }
                j + 1
            }
            Suffix::Literal(tag, terminated) => {
                // Strict LIFO: a dollar span that is not the innermost body's
                // close delimiter never satisfies a DO frame.
                let j = suffix_idx.expect("literal suffix has an index");
                let suffix_end = self.spans[j].end;
                let deeper = self.innermost_do(&tag).is_some();
                let mut notes = Vec::new();
                if deeper {
                    notes.push("tag matches a non-innermost open body");
                }
                if !terminated {
                    notes.push("dropped span included an unterminated dollar quote");
                }
                let note = (!notes.is_empty()).then(|| notes.join("; "));
                self.drop_orphan(FrameKind::DoTagged(tag), end_span.start, suffix_end, note);
                j + 1
            }
            Suffix::Bare => {
                if self.stack.last().map(|f| &f.kind) == Some(&FrameKind::Begin) {
                    self.stack.pop();
                    self.emit(&end_span);
                } else {
                    let deeper = self.stack.iter().any(|f| f.kind == FrameKind::Begin);
                    let note = deeper.then(|| {
                        "a matching frame is open deeper in the stack; \
                         conservatively treated as unmatched"
                            .to_string()
                    });
                    self.drop_orphan(FrameKind::Begin, end_span.start, end_span.end, note);
                }
                idx + 1
            }
        }
    }

    fn finish(mut self) -> Rebalanced {
        // Terminate a trailing open construct first, or the closers appended
        // below would be swallowed inside it on the next pass.
        if let Some(term) = self.tail_open.take() {
            self.out.push_str(&term);
        }

        while let Some(frame) = self.stack.pop() {
            let (kind, offset) = if frame.envelope
                && matches!(
                    self.stack.last().map(|f| &f.kind),
                    Some(FrameKind::DoTagged(_))
                ) {
                // The body BEGIN and its DO frame share one `END $tag$;`.
                let do_frame = self.stack.pop().expect("DO frame under envelope BEGIN");
                (do_frame.kind, do_frame.offset)
            } else {
                (frame.kind, frame.offset)
            };
            let outermost_do = matches!(kind, FrameKind::DoTagged(_))
                && !self
                    .stack
                    .iter()
                    .any(|f| matches!(f.kind, FrameKind::DoTagged(_)));
            let closer = match (&kind, self.append_language && outermost_do) {
                (FrameKind::DoTagged(tag), true) => format!("END ${tag}$ LANGUAGE plpgsql;"),
                _ => kind.closer(),
            };
            debug!(offset, frame = ?kind, "synthesizing closer at end of input");
            push_closer(&mut self.out, &closer);
            let mut d = Diagnostic::new(DiagnosticKind::UnclosedFrame, offset);
            d.frame = Some(kind);
            d.note = Some("closed at end of input".to_string());
            self.diagnostics.push(d);
        }

        Rebalanced {
            text: self.out,
            diagnostics: self.diagnostics,
        }
    }

    fn run(mut self) -> Rebalanced {
        let mut idx = 0;
        while idx < self.spans.len() {
            let span = self.spans[idx].clone();
            let strip = std::mem::take(&mut self.strip_semi);
            match &span.kind {
                SpanKind::Plain => {
                    let mut s = span.text(self.text);
                    if strip {
                        s = strip_leading_semi(s);
                    }
                    if !span.is_ws(self.text) {
                        self.expect_envelope = false;
                    }
                    self.out.push_str(s);
                    idx += 1;
                }
                SpanKind::LineComment | SpanKind::BlockComment { .. } => {
                    if let Some(d) = unterminated_diag(&span) {
                        self.diagnostics.push(d);
                        self.tail_open = tail_terminator(&span);
                    }
                    self.emit(&span);
                    idx += 1;
                }
                SpanKind::Str { .. } | SpanKind::QuotedIdent { .. } | SpanKind::Dollar { .. } => {
                    if let Some(d) = unterminated_diag(&span) {
                        self.diagnostics.push(d);
                        self.tail_open = tail_terminator(&span);
                    }
                    self.expect_envelope = false;
                    self.emit(&span);
                    idx += 1;
                }
                SpanKind::BodyOpen { tag } => {
                    self.push_frame(FrameKind::DoTagged(tag.clone()), span.start, false);
                    self.expect_envelope = true;
                    self.emit(&span);
                    idx += 1;
                }
                SpanKind::BodyClose { tag } => {
                    self.expect_envelope = false;
                    let tag = tag.clone();
                    match self.innermost_do(&tag) {
                        Some(pos) => {
                            self.close_down_to(pos, span.start, false);
                            self.emit(&span);
                        }
                        None => {
                            self.drop_orphan(
                                FrameKind::DoTagged(tag),
                                span.start,
                                span.end,
                                None,
                            );
                        }
                    }
                    idx += 1;
                }
                SpanKind::Keyword(kw) => match kw {
                    Kw::Do => {
                        self.expect_envelope = false;
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::Begin => {
                        let envelope = self.expect_envelope;
                        self.expect_envelope = false;
                        self.push_frame(FrameKind::Begin, span.start, envelope);
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::If => {
                        self.expect_envelope = false;
                        self.push_frame(FrameKind::If, span.start, false);
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::Loop => {
                        self.expect_envelope = false;
                        self.push_frame(FrameKind::Loop, span.start, false);
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::Case => {
                        self.expect_envelope = false;
                        self.push_frame(FrameKind::Case, span.start, false);
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::Then | Kw::Elsif | Kw::Else | Kw::When => {
                        self.expect_envelope = false;
                        self.emit(&span);
                        idx += 1;
                    }
                    Kw::End => {
                        self.expect_envelope = false;
                        idx = self.handle_end(idx);
                    }
                },
            }
        }
        self.finish()
    }
}

/// Repair unbalanced PL/pgSQL block structure in `text`: orphan closers are
/// dropped, missing closers are synthesized, and string/dollar-quoted bodies
/// pass through untouched. Every change is reported as a diagnostic. The
/// transform is idempotent; it restores nesting, not meaning.
pub fn rebalance(text: &str, opt: &RebalanceOptions) -> Rebalanced {
    Rebalancer::new(text, opt).run()
}

/// True when `text` already round-trips through `rebalance` unchanged.
pub fn is_balanced(text: &str) -> bool {
    rebalance(text, &RebalanceOptions::default()).text == text
}
