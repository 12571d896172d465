use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::blocks::split_blocks;
use crate::lexer::{scan, Kw, SpanKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBalance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub offset: usize,
    pub begin_count: usize,
    pub end_count: usize,
    /// Dollar tags whose delimiters do not pair up, as `$tag$`.
    pub odd_tags: Vec<String>,
    pub problems: Vec<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub blocks_scanned: usize,
    pub blocks_with_problems: usize,
    pub blocks: Vec<BlockBalance>,
}

fn audit_one(id: Option<u64>, offset: usize, body: &str) -> BlockBalance {
    let mut begin_count = 0usize;
    let mut end_count = 0usize;
    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for span in scan(body) {
        match &span.kind {
            SpanKind::Keyword(Kw::Begin) => begin_count += 1,
            SpanKind::Keyword(Kw::End) => end_count += 1,
            SpanKind::BodyOpen { tag } | SpanKind::BodyClose { tag } => {
                *tag_counts.entry(tag.clone()).or_insert(0) += 1;
            }
            SpanKind::Dollar { tag, terminated } => {
                *tag_counts.entry(tag.clone()).or_insert(0) += if *terminated { 2 } else { 1 };
            }
            _ => {}
        }
    }
    let odd_tags: Vec<String> = tag_counts
        .iter()
        .filter(|(_, &count)| count % 2 != 0)
        .map(|(tag, _)| format!("${tag}$"))
        .collect();

    let mut problems = Vec::new();
    if !odd_tags.is_empty() {
        problems.push(format!("unbalanced_dollar_tags={}", odd_tags.join(",")));
    }
    if begin_count != end_count {
        problems.push(format!("begin_end_mismatch={begin_count}:{end_count}"));
    }
    let snippet = body.lines().take(8).collect::<Vec<_>>().join("\n");
    BlockBalance {
        id,
        offset,
        begin_count,
        end_count,
        odd_tags,
        problems,
        snippet,
    }
}

/// Audit every fix region for dollar-tag parity and BEGIN/END balance.
/// Counts are span-aware: keywords inside literals and comments are ignored,
/// unlike the raw word counts a regex pass would produce.
pub fn check_balance(text: &str) -> BalanceReport {
    let split = split_blocks(text);
    let blocks: Vec<BlockBalance> = if split.blocks.is_empty() {
        vec![audit_one(None, 0, text)]
    } else {
        split
            .blocks
            .iter()
            .map(|b| audit_one(Some(b.id), b.start, b.body))
            .collect()
    };
    let blocks_with_problems = blocks.iter().filter(|b| !b.problems.is_empty()).count();
    BalanceReport {
        blocks_scanned: blocks.len(),
        blocks_with_problems,
        blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_block_reports_no_problems() {
        let report = check_balance("DO $$ BEGIN NULL; END $$;");
        assert_eq!(report.blocks_scanned, 1);
        assert_eq!(report.blocks_with_problems, 0);
        assert_eq!(report.blocks[0].begin_count, 1);
        assert_eq!(report.blocks[0].end_count, 1);
    }

    #[test]
    fn odd_tag_and_mismatch_are_reported() {
        let report = check_balance("DO $a$ BEGIN NULL;");
        let block = &report.blocks[0];
        assert_eq!(block.odd_tags, vec!["$a$".to_string()]);
        assert_eq!(block.begin_count, 1);
        assert_eq!(block.end_count, 0);
        assert_eq!(block.problems.len(), 2);
    }

    #[test]
    fn keywords_inside_literals_do_not_count() {
        let report = check_balance("BEGIN SELECT 'END END END'; END;");
        let block = &report.blocks[0];
        assert_eq!(block.begin_count, 1);
        assert_eq!(block.end_count, 1);
        assert!(block.problems.is_empty());
    }
}
