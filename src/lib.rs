//! Dollar-quote aware tokenizer and block rebalancer for PL/pgSQL text.
//!
//! Scans SQL without letting keyword matching bleed into string literals or
//! dollar-quoted bodies, tracks IF/LOOP/CASE/BEGIN/DO nesting on an explicit
//! stack, drops orphan closers, synthesizes missing ones, and reports every
//! repair as a diagnostic.

pub mod balance;
pub mod blocks;
pub mod error;
pub mod lexer;
pub mod pipeline;
pub mod rebalance;
pub mod rewrap;
pub mod types;

pub use balance::{check_balance, BalanceReport, BlockBalance};
pub use blocks::{split_blocks, Block, SplitFile, FIX_MARKER};
pub use error::{MendError, MendResult};
pub use pipeline::{repair_bytes, repair_text};
pub use rebalance::{
    is_balanced, rebalance, Diagnostic, DiagnosticKind, FrameKind, RebalanceOptions, Rebalanced,
};
pub use rewrap::{contains_create_function, ensure_language, wrap_do};
pub use types::{BlockRepair, FileRepair, RepairOptions, RepairReport, WrapMode};
