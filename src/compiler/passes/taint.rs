//! Taint propagation
//!
//! Every argument of a call to a recognized input source becomes tainted, and
//! taint then flows forward along def-use edges until a fixpoint:
//!
//! ```text
//! %2 = alloca [64 x i8]
//! call i64 @fgets(%2, 64, %arg0)   ; seeds %2
//! %3 = field_addr [64 x i8], %2, 0 ; tainted: uses %2
//! store %3, %7                     ; tainted: uses %3
//! ```
//!
//! Taint does not flow backward through memory: a load from a location a
//! tainted value was stored into is not itself tainted.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::{FunctionPass, PassContext, PassOutcome, PreservedAnalyses};
use crate::compiler::mir::{Callee, InstId, MirFunction, MirInst, ValueId};
use crate::compiler::report::{PassReport, TaintReport};
use crate::config::DEFAULT_TAINT_PASS_NAME;

/// Tainted values of one function plus the tainted values written to memory
#[derive(Debug, Clone, Default)]
pub struct TaintState {
    tainted: HashSet<ValueId>,
    memory_writes: Vec<ValueId>,
    memory_write_set: HashSet<ValueId>,
}

impl TaintState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `value` tainted; returns true if it was not tainted before
    pub fn mark(&mut self, value: ValueId) -> bool {
        self.tainted.insert(value)
    }

    pub fn is_tainted(&self, value: ValueId) -> bool {
        self.tainted.contains(&value)
    }

    pub fn len(&self) -> usize {
        self.tainted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tainted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.tainted.iter().copied()
    }

    /// Tainted values that are the target of a memory write, in discovery order
    pub fn memory_writes(&self) -> &[ValueId] {
        &self.memory_writes
    }

    pub fn is_memory_write(&self, value: ValueId) -> bool {
        self.memory_write_set.contains(&value)
    }

    fn record_memory_write(&mut self, value: ValueId) -> bool {
        if self.memory_write_set.insert(value) {
            self.memory_writes.push(value);
            true
        } else {
            false
        }
    }
}

/// Compute the taint set and the tainted-write set of `func`
pub fn identify_tainted(func: &MirFunction, ctx: &PassContext<'_>) -> TaintState {
    let mut state = TaintState::new();
    let mut worklist = VecDeque::new();

    // Stage 1: seed from source call arguments
    for id in func.layout() {
        let MirInst::Call {
            callee: Callee::Direct(name),
            args,
            ..
        } = func.inst(id)
        else {
            continue;
        };
        if !ctx.catalog.is_source(name) {
            continue;
        }
        for value in args.iter().filter_map(|arg| arg.id()) {
            if state.mark(value) {
                if ctx.trace() {
                    debug!(source = %name, value = %func.describe_value(value), "taint seed");
                }
                worklist.push_back(value);
            }
        }
    }

    // Stage 2: forward propagation to a fixpoint
    let uses = func.use_map();
    while let Some(value) = worklist.pop_front() {
        let Some(users) = uses.get(&value) else {
            continue;
        };
        for &user in users {
            let user = ValueId::Inst(user);
            if state.mark(user) {
                if ctx.trace() {
                    debug!(from = %value, value = %func.describe_value(user), "taint propagated");
                }
                worklist.push_back(user);
            }
        }
    }

    // Stage 3: which tainted values are written through
    detect_memory_writes(func, ctx, &mut state);
    state
}

/// Record tainted store targets and tainted arguments of calls that may write
fn detect_memory_writes(func: &MirFunction, ctx: &PassContext<'_>, state: &mut TaintState) {
    for id in func.layout() {
        match func.inst(id) {
            MirInst::Store { ptr, .. } => {
                if let Some(target) = ptr.id()
                    && state.is_tainted(target)
                {
                    note_memory_write(func, ctx, state, target, id);
                }
            }
            MirInst::Call { callee, args, .. } if call_may_write(callee, ctx) => {
                for value in args.iter().filter_map(|arg| arg.id()) {
                    if state.is_tainted(value) {
                        note_memory_write(func, ctx, state, value, id);
                    }
                }
            }
            _ => {}
        }
    }
}

fn note_memory_write(
    func: &MirFunction,
    ctx: &PassContext<'_>,
    state: &mut TaintState,
    value: ValueId,
    writer: InstId,
) {
    if state.record_memory_write(value) && ctx.trace() {
        debug!(
            value = %func.describe_value(value),
            writer = %func.display_inst(writer),
            "tainted memory write"
        );
    }
}

/// Whether a call may write through its pointer arguments
fn call_may_write(callee: &Callee, ctx: &PassContext<'_>) -> bool {
    match callee {
        Callee::Indirect(_) => true,
        Callee::Direct(name) => {
            ctx.catalog.is_sink(name)
                || (!ctx.symbols.is_defined(name) && !ctx.catalog.is_source(name))
        }
    }
}

/// Tainted instructions in layout order
pub(crate) fn tainted_instructions(func: &MirFunction, state: &TaintState) -> Vec<InstId> {
    func.layout()
        .filter(|&id| state.is_tainted(ValueId::Inst(id)))
        .collect()
}

/// Per-function taint analysis; reports but never mutates the function
pub struct TaintTracking {
    name: String,
}

impl TaintTracking {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for TaintTracking {
    fn default() -> Self {
        Self::new(DEFAULT_TAINT_PASS_NAME)
    }
}

impl FunctionPass for TaintTracking {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, func: &mut MirFunction, ctx: &PassContext<'_>) -> PassOutcome {
        let state = identify_tainted(func, ctx);
        let report = TaintReport::from_state(func, &state);
        PassOutcome {
            changed: false,
            preserved: PreservedAnalyses::None,
            report: PassReport::Taint(report),
        }
    }
}
