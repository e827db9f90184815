//! Guard instrumentation
//!
//! Every program store whose target pointer carries bounds is split off into
//! its own block and preceded by two checks that branch to a shared fault
//! block:
//!
//! ```text
//! bb0:  %c1 = cmp ult %p, %lo
//!       br %c1, fault, bb1
//! bb1:  %pi = ptrtoint %p
//!       %li = ptrtoint %lo
//!       %off = sub %pi, %li
//!       %c2 = cmp uge %off, %ext
//!       br %c2, fault, bb2
//! bb2:  store %v, %p
//!       ...
//! fault: trap
//!        ret <zero>
//! ```

use tracing::debug;

use super::bounds::{BoundsPair, BoundsState, instrument_bounds};
use super::{FunctionPass, PassContext, PassOutcome, PreservedAnalyses};
use crate::compiler::mir::{
    BinOpKind, BlockId, CmpPred, InstId, Location, MirFunction, MirInst, MirValue,
};
use crate::compiler::report::{BoundsReport, PassReport};
use crate::config::DEFAULT_BOUNDS_PASS_NAME;

/// What guard insertion did to one function
#[derive(Debug, Clone, Default)]
pub struct GuardSummary {
    /// Shared fault block, created on the first guarded store
    pub fault_block: Option<BlockId>,
    /// Guarded stores in layout order
    pub guarded_stores: Vec<InstId>,
    pub instructions_added: usize,
}

/// Guard every bounded program store of `func`
pub fn insert_guards(
    func: &mut MirFunction,
    bounds: &BoundsState,
    ctx: &PassContext<'_>,
) -> GuardSummary {
    // Snapshot targets before any block is split
    let targets: Vec<(InstId, MirValue, BoundsPair)> = func
        .layout()
        .filter(|&id| !bounds.is_synthesized(id))
        .filter_map(|id| {
            let MirInst::Store { ptr, .. } = func.inst(id) else {
                return None;
            };
            let pair = ptr.id().and_then(|value| bounds.get(value))?;
            Some((id, *ptr, pair))
        })
        .collect();

    let mut summary = GuardSummary::default();
    for (store, ptr, pair) in targets {
        let fault = match summary.fault_block {
            Some(block) => block,
            None => create_fault_block(func, &mut summary),
        };
        let added = guard_store(func, store, ptr, pair, fault);
        if added > 0 {
            summary.guarded_stores.push(store);
            summary.instructions_added += added;
            if ctx.trace() {
                debug!(store = %func.display_inst(store), "store guarded");
            }
        }
    }
    summary
}

/// Append `trap; ret <zero>` as a new block
fn create_fault_block(func: &mut MirFunction, summary: &mut GuardSummary) -> BlockId {
    let block = func.alloc_block();
    func.push(block, MirInst::Trap);
    let val = func.ret_ty.zero_value();
    func.set_terminator(block, MirInst::Return { val });
    summary.fault_block = Some(block);
    summary.instructions_added += 2;
    block
}

/// Insert the underflow then overflow check ahead of `store`
fn guard_store(
    func: &mut MirFunction,
    store: InstId,
    ptr: MirValue,
    pair: BoundsPair,
    fault: BlockId,
) -> usize {
    let Some(Location { block: head, .. }) = func.position(store) else {
        return 0;
    };

    // ptr < lower
    let below = func.insert_before(
        store,
        MirInst::Cmp {
            pred: CmpPred::Ult,
            lhs: ptr,
            rhs: pair.lower,
        },
    );
    let cont = func.split_block_before(store);
    func.set_terminator(
        head,
        MirInst::Branch {
            cond: below.into(),
            if_true: fault,
            if_false: cont,
        },
    );

    // ptr - lower >= extent
    let ptr_int = func.insert_before(store, MirInst::PtrToInt { src: ptr });
    let lower_int = func.insert_before(store, MirInst::PtrToInt { src: pair.lower });
    let offset = func.insert_before(
        store,
        MirInst::BinOp {
            op: BinOpKind::Sub,
            lhs: ptr_int.into(),
            rhs: lower_int.into(),
        },
    );
    let beyond = func.insert_before(
        store,
        MirInst::Cmp {
            pred: CmpPred::Uge,
            lhs: offset.into(),
            rhs: pair.extent,
        },
    );
    let tail = func.split_block_before(store);
    func.set_terminator(
        cont,
        MirInst::Branch {
            cond: beyond.into(),
            if_true: fault,
            if_false: tail,
        },
    );

    7
}

/// Bounds propagation followed by guard insertion
pub struct BoundsGuard {
    name: String,
}

impl BoundsGuard {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for BoundsGuard {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDS_PASS_NAME)
    }
}

impl FunctionPass for BoundsGuard {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, func: &mut MirFunction, ctx: &PassContext<'_>) -> PassOutcome {
        let bounds = instrument_bounds(func, ctx);
        let guards = insert_guards(func, &bounds, ctx);
        let instructions_added = bounds.instructions_added() + guards.instructions_added;

        let report = BoundsReport {
            function: func.name.clone(),
            instructions_added,
            bounded_values: bounds.len(),
            merges: bounds.merge_count(),
            guarded_stores: guards.guarded_stores.len(),
        };
        PassOutcome {
            changed: instructions_added > 0,
            preserved: PreservedAnalyses::None,
            report: PassReport::Bounds(report),
        }
    }
}
