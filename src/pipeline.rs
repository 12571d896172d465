use tracing::debug;

use crate::blocks::split_blocks;
use crate::error::MendResult;
use crate::rebalance::{rebalance, DiagnosticKind, RebalanceOptions};
use crate::rewrap::{contains_create_function, ensure_language, starts_with_do, wrap_do};
use crate::types::{BlockRepair, FileRepair, RepairOptions, RepairReport, WrapMode};

fn repair_one(
    body: &str,
    id: Option<u64>,
    offset: usize,
    opt: &RepairOptions,
) -> (String, BlockRepair) {
    let rebalanced = rebalance(
        body,
        &RebalanceOptions {
            append_language: opt.append_language,
        },
    );
    let mut text = rebalanced.text;

    let wrap = match opt.wrap {
        WrapMode::Never => false,
        WrapMode::Always => !contains_create_function(&text),
        WrapMode::Auto => !contains_create_function(&text) && !starts_with_do(&text),
    };
    let rewrapped = wrap && !text.trim().is_empty();
    if rewrapped {
        text = wrap_do(&text);
    }

    if opt.ensure_language {
        let (rewritten, count) = ensure_language(&text);
        if count > 0 {
            text = rewritten;
        }
    }

    let changed = text != body;
    debug!(
        ?id,
        offset,
        changed,
        rewrapped,
        diagnostics = rebalanced.diagnostics.len(),
        "repaired block"
    );
    (
        text,
        BlockRepair {
            id,
            offset,
            changed,
            rewrapped,
            skipped: false,
            diagnostics: rebalanced.diagnostics,
        },
    )
}

fn summarize(blocks: Vec<BlockRepair>) -> RepairReport {
    let diag_count = |kind: DiagnosticKind| {
        blocks
            .iter()
            .flat_map(|b| &b.diagnostics)
            .filter(|d| d.kind == kind)
            .count()
    };
    RepairReport {
        blocks_scanned: blocks.len(),
        blocks_changed: blocks.iter().filter(|b| b.changed).count(),
        blocks_skipped: blocks.iter().filter(|b| b.skipped).count(),
        orphan_closers_dropped: diag_count(DiagnosticKind::OrphanCloser),
        closers_synthesized: diag_count(DiagnosticKind::UnclosedFrame),
        blocks,
    }
}

/// Repair a whole file: split into fix regions, rebalance the selected ones,
/// optionally rewrap, and reassemble with preamble and headers preserved.
/// Pure; no file or database awareness.
pub fn repair_text(text: &str, opt: &RepairOptions) -> FileRepair {
    let split = split_blocks(text);

    if split.blocks.is_empty() {
        let (output, block) = repair_one(text, None, 0, opt);
        return FileRepair {
            output,
            report: summarize(vec![block]),
        };
    }

    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(split.preamble);
    let mut reports = Vec::with_capacity(split.blocks.len());
    for block in &split.blocks {
        out.push_str(block.header);
        out.push('\n');
        let selected = opt
            .select_ids
            .as_ref()
            .map(|ids| ids.contains(&block.id))
            .unwrap_or(true);
        if selected {
            let (repaired, report) = repair_one(block.body, Some(block.id), block.start, opt);
            out.push_str(&repaired);
            reports.push(report);
        } else {
            out.push_str(block.body);
            reports.push(BlockRepair {
                id: Some(block.id),
                offset: block.start,
                changed: false,
                rewrapped: false,
                skipped: true,
                diagnostics: Vec::new(),
            });
        }
    }
    FileRepair {
        output: out,
        report: summarize(reports),
    }
}

/// Strict UTF-8 decode, then `repair_text`. Decode failure is the only
/// error path.
pub fn repair_bytes(bytes: &[u8], opt: &RepairOptions) -> MendResult<FileRepair> {
    let text = std::str::from_utf8(bytes)?;
    Ok(repair_text(text, opt))
}
