use serde::{Deserialize, Serialize};

use crate::rebalance::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    /// Wrap blocks that neither define a function nor already start with a
    /// top-level DO statement.
    Auto,
    Never,
    /// Wrap every block without a CREATE FUNCTION, even an existing DO.
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOptions {
    pub wrap: WrapMode,
    /// Synthesized closer for the outermost DO body carries `LANGUAGE plpgsql`.
    pub append_language: bool,
    /// Rewrite `END $tag$;` closes without a LANGUAGE clause.
    pub ensure_language: bool,
    /// Repair only these block ids; others pass through verbatim.
    pub select_ids: Option<Vec<u64>>,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            wrap: WrapMode::Auto,
            append_language: false,
            ensure_language: false,
            select_ids: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRepair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Byte offset of the block body in the input.
    pub offset: usize,
    pub changed: bool,
    pub rewrapped: bool,
    pub skipped: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub blocks_scanned: usize,
    pub blocks_changed: usize,
    pub blocks_skipped: usize,
    pub orphan_closers_dropped: usize,
    pub closers_synthesized: usize,
    pub blocks: Vec<BlockRepair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRepair {
    /// The repaired text artifact.
    pub output: String,
    pub report: RepairReport,
}
