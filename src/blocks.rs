use crate::lexer::{scan, SpanKind};

/// Marker line prefix delimiting one reassembled fix region.
pub const FIX_MARKER: &str = "-- PROPOSED FIX: Reassembled function for failing statement ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub id: u64,
    /// The full marker line, without its trailing newline.
    pub header: &'a str,
    pub body: &'a str,
    /// Byte offset of the body in the source text.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFile<'a> {
    /// Text before the first marker; the whole input when there are none.
    pub preamble: &'a str,
    pub blocks: Vec<Block<'a>>,
}

fn marker_id(text: &str, line_start: usize) -> Option<(u64, usize)> {
    let rest = text.get(line_start..)?;
    let after = rest.strip_prefix(FIX_MARKER)?;
    let digits: &str = &after[..after.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let id = digits.parse::<u64>().ok()?;
    let line_end = match rest.find('\n') {
        Some(n) => line_start + n,
        None => text.len(),
    };
    Some((id, line_end))
}

/// Split a file into `-- PROPOSED FIX` regions. A marker line that starts
/// inside a dollar-quoted literal or an open DO body is not a boundary, so
/// a region never cuts through a dollar body. Text without markers yields an
/// empty block list and the whole input as preamble.
pub fn split_blocks(text: &str) -> SplitFile<'_> {
    // Dollar literal and DO body ranges, used to reject markers inside
    // protected bodies.
    let mut literal_ranges: Vec<(usize, usize)> = Vec::new();
    let mut open_bodies: Vec<usize> = Vec::new();
    for span in scan(text) {
        match span.kind {
            SpanKind::Dollar { .. } => literal_ranges.push((span.start, span.end)),
            SpanKind::BodyOpen { .. } => open_bodies.push(span.start),
            SpanKind::BodyClose { .. } => {
                if let Some(start) = open_bodies.pop() {
                    literal_ranges.push((start, span.end));
                }
            }
            _ => {}
        }
    }
    // A body whose close delimiter never arrives protects through to EOF.
    literal_ranges.extend(open_bodies.into_iter().map(|start| (start, text.len())));
    let in_literal = |pos: usize| {
        literal_ranges
            .iter()
            .any(|&(start, end)| start < pos && pos < end)
    };

    // (header_start, body_start, header, id) for each accepted marker line.
    let mut markers: Vec<(usize, usize, &str, u64)> = Vec::new();
    let mut pos = 0;
    loop {
        if !in_literal(pos) {
            if let Some((id, line_end)) = marker_id(text, pos) {
                let header = &text[pos..line_end];
                let body_start = (line_end + 1).min(text.len());
                markers.push((pos, body_start, header, id));
            }
        }
        match text[pos..].find('\n') {
            Some(n) => pos += n + 1,
            None => break,
        }
        if pos >= text.len() {
            break;
        }
    }

    if markers.is_empty() {
        return SplitFile {
            preamble: text,
            blocks: Vec::new(),
        };
    }

    let preamble = &text[..markers[0].0];
    let mut blocks = Vec::with_capacity(markers.len());
    for (i, &(_, body_start, header, id)) in markers.iter().enumerate() {
        let end = markers
            .get(i + 1)
            .map(|&(next_start, ..)| next_start)
            .unwrap_or(text.len());
        blocks.push(Block {
            id,
            header,
            body: &text[body_start..end],
            start: body_start,
            end,
        });
    }
    SplitFile { preamble, blocks }
}
