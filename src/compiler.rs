//! Taint tracking and write-bounds instrumentation over SSA MIR
//!
//! ```text
//! MirModule ─┬─> taint-track   (TaintSet, tainted-write set, report)
//!            └─> bounds-guard  (bounds facts ─> guarded stores + fault block)
//! ```

pub mod catalog;
pub mod cfg;
pub mod mir;
pub mod passes;
pub mod report;
pub mod verify;

pub use catalog::SourceCatalog;
pub use cfg::CFG;
pub use mir::{
    BasicBlock, BlockId, Callee, CmpPred, InstId, MirFunction, MirInst, MirModule, MirType,
    MirValue, SymbolTable, ValueId,
};
pub use passes::{
    BoundsGuard, FunctionPass, PassContext, PassManager, PassOutcome, PassRegistry,
    PreservedAnalyses, TaintTracking,
};
pub use report::{BoundsReport, PassReport, TaintReport};
pub use verify::{VerifyError, verify_function};

use thiserror::Error;

/// Errors surfaced by the pass driver
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("unknown pass '{name}' in pipeline (registered: {registered})")]
    UnknownPass { name: String, registered: String },

    #[error("empty pass pipeline")]
    EmptyPipeline,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("function '{function}' failed verification after pass '{pass}': {source}")]
    Verification {
        function: String,
        pass: String,
        #[source]
        source: VerifyError,
    },
}
