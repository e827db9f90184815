//! Bounds metadata synthesis and propagation
//!
//! Every pointer the pass can reason about is paired with a runtime
//! (lower bound, extent) pair of MIR values:
//!
//! - Fixed-size array allocations are their own lower bound, with the
//!   allocation's byte size as extent
//! - Pointer parameters arrive packed as `{ ptr, ptr, i64 }` triples and are
//!   unpacked at function entry
//! - Pointer-typed locals get two shadow slots that carry the pair through
//!   memory
//!
//! Facts then flow forward along def-use edges with a FIFO worklist. Merges
//! get a lower phi and an extent phi, calls to functions defined in the module
//! get their bounded pointer arguments re-packed, and stores into shadowed
//! locals spill the pair so that later loads can reload it. Pointer arguments
//! to those callees that never got a fact are packed as unbounded, so every
//! callee that unpacks a triple receives one.
//!
//! Entries are only ever added: a value's pair is fixed by the first fact that
//! reaches it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::collections::hash_map::Entry;

use tracing::{debug, warn};

use super::PassContext;
use crate::compiler::mir::{BlockId, InstId, MirFunction, MirInst, MirType, MirValue, ValueId};

/// Extent of a pointer with no known bounds: all ones, which no unsigned
/// offset reaches
pub const UNBOUNDED_EXTENT: i64 = -1;

/// Runtime (lower bound, extent in bytes) of a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsPair {
    pub lower: MirValue,
    pub extent: MirValue,
}

impl BoundsPair {
    pub fn new(lower: MirValue, extent: MirValue) -> Self {
        Self { lower, extent }
    }

    /// Zero lower bound and all-ones extent
    pub fn unbounded() -> Self {
        Self {
            lower: MirValue::Zero,
            extent: MirValue::Const(UNBOUNDED_EXTENT),
        }
    }
}

/// Shadow allocations carrying a pointer local's bounds through memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowSlots {
    pub lower: InstId,
    pub extent: InstId,
}

/// Lower and extent phis synthesized for a merge value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeBounds {
    pub lower: InstId,
    pub extent: InstId,
}

/// Everything the bounds pass learned about one function
#[derive(Debug, Clone, Default)]
pub struct BoundsState {
    bounds: HashMap<ValueId, BoundsPair>,
    shadows: HashMap<InstId, ShadowSlots>,
    merges: HashMap<InstId, MergeBounds>,
    /// (merge, incoming slot) pairs that received real facts
    filled_slots: HashSet<(InstId, usize)>,
    /// Loads of shadowed locals that already got reload loads
    reloaded_loads: HashSet<InstId>,
    /// Program stores into shadowed locals that spilled a pair
    spilled_stores: HashSet<InstId>,
    /// (call, argument position) pairs already passed as triples
    packed_args: HashSet<(InstId, usize)>,
    /// Instructions synthesized by the pass
    synthesized: HashSet<InstId>,
    instructions_added: usize,
}

impl BoundsState {
    pub fn get(&self, value: ValueId) -> Option<BoundsPair> {
        self.bounds.get(&value).copied()
    }

    pub fn has_bounds(&self, value: ValueId) -> bool {
        self.bounds.contains_key(&value)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValueId, BoundsPair)> + '_ {
        self.bounds.iter().map(|(&value, &pair)| (value, pair))
    }

    pub fn shadow_slots(&self, local: InstId) -> Option<ShadowSlots> {
        self.shadows.get(&local).copied()
    }

    pub fn merge_bounds(&self, merge: InstId) -> Option<MergeBounds> {
        self.merges.get(&merge).copied()
    }

    pub fn merge_count(&self) -> usize {
        self.merges.len()
    }

    /// Whether `id` was created by the pass rather than the program
    pub fn is_synthesized(&self, id: InstId) -> bool {
        self.synthesized.contains(&id)
    }

    pub fn instructions_added(&self) -> usize {
        self.instructions_added
    }

    /// Insert a pair unless the value already has one
    fn insert(&mut self, value: ValueId, pair: BoundsPair) -> bool {
        match self.bounds.entry(value) {
            Entry::Vacant(slot) => {
                slot.insert(pair);
                true
            }
            Entry::Occupied(_) => false,
        }
    }
}

/// Synthesize, propagate and materialize bounds for every pointer in `func`
pub fn instrument_bounds(func: &mut MirFunction, ctx: &PassContext<'_>) -> BoundsState {
    let mut engine = BoundsEngine::new(ctx);
    if func.blocks.is_empty() {
        return engine.state;
    }

    engine.unpack_parameters(func);
    engine.seed_allocations(func);
    engine.propagate(func);
    engine.pack_unbounded_arguments(func);
    engine.finalize_merges(func);
    engine.finalize_shadow_slots(func);

    if ctx.trace() {
        debug!(
            function = %func.name,
            bounded = engine.state.len(),
            merges = engine.state.merge_count(),
            added = engine.state.instructions_added,
            "bounds propagation finished"
        );
    }
    engine.state
}

struct BoundsEngine<'a> {
    ctx: &'a PassContext<'a>,
    state: BoundsState,
    worklist: VecDeque<ValueId>,
    visited: HashSet<ValueId>,
}

impl<'a> BoundsEngine<'a> {
    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self {
            ctx,
            state: BoundsState::default(),
            worklist: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    fn note(&mut self, id: InstId) -> InstId {
        self.state.synthesized.insert(id);
        self.state.instructions_added += 1;
        id
    }

    fn emit_before(&mut self, func: &mut MirFunction, anchor: InstId, inst: MirInst) -> InstId {
        let id = func.insert_before(anchor, inst);
        self.note(id)
    }

    fn emit_after(&mut self, func: &mut MirFunction, anchor: InstId, inst: MirInst) -> InstId {
        let id = func.insert_after(anchor, inst);
        self.note(id)
    }

    /// Emit at `*index` in `block` and advance the cursor
    fn emit_at(
        &mut self,
        func: &mut MirFunction,
        block: BlockId,
        index: &mut usize,
        inst: MirInst,
    ) -> InstId {
        let id = func.insert_at(block, *index, inst);
        *index += 1;
        self.note(id)
    }

    /// Record a fact and schedule its users; existing entries are kept
    fn record(&mut self, func: &MirFunction, value: ValueId, pair: BoundsPair) {
        if self.state.insert(value, pair) {
            if self.ctx.trace() {
                debug!(
                    value = %func.describe_value(value),
                    lower = %pair.lower,
                    extent = %pair.extent,
                    "bounds recorded"
                );
            }
            self.worklist.push_back(value);
        }
    }

    /// Unpack every pointer parameter from its `{ raw, lower, extent }` triple
    fn unpack_parameters(&mut self, func: &mut MirFunction) {
        if self.ctx.config.is_raw_abi(&func.name) {
            return;
        }
        let entry = func.entry;
        let triple = MirType::fat_pointer();
        let mut at = func.entry_insertion_index();

        for idx in 0..func.params.len() {
            if !func.params[idx].ty.is_pointer() {
                continue;
            }
            let param = ValueId::Param(idx as u32);
            let base = MirValue::Param(idx as u32);
            let users = func.users(param);

            let lower_addr = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::FieldAddr {
                    base,
                    ty: triple.clone(),
                    index: 1,
                },
            );
            let lower = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::Load {
                    ptr: lower_addr.into(),
                    ty: MirType::Ptr,
                },
            );
            let extent_addr = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::FieldAddr {
                    base,
                    ty: triple.clone(),
                    index: 2,
                },
            );
            let extent = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::Load {
                    ptr: extent_addr.into(),
                    ty: MirType::I64,
                },
            );
            let raw_addr = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::FieldAddr {
                    base,
                    ty: triple.clone(),
                    index: 0,
                },
            );
            let raw = self.emit_at(
                func,
                entry,
                &mut at,
                MirInst::Load {
                    ptr: raw_addr.into(),
                    ty: MirType::Ptr,
                },
            );

            for user in users {
                func.inst_mut(user).replace_operand(param, raw.into());
            }
            self.record(
                func,
                ValueId::Inst(raw),
                BoundsPair::new(lower.into(), extent.into()),
            );
        }
    }

    /// Arrays bound themselves; pointer locals get shadow slots
    fn seed_allocations(&mut self, func: &mut MirFunction) {
        let allocas: Vec<(InstId, MirType)> = func
            .layout()
            .filter(|&id| !self.state.is_synthesized(id))
            .filter_map(|id| match func.inst(id) {
                MirInst::Alloca { ty } => Some((id, ty.clone())),
                _ => None,
            })
            .collect();

        for (alloca, ty) in allocas {
            match ty {
                MirType::Array { .. } => {
                    let extent = MirValue::Const(ty.size() as i64);
                    self.record(
                        func,
                        ValueId::Inst(alloca),
                        BoundsPair::new(alloca.into(), extent),
                    );
                }
                MirType::Ptr => {
                    let lower = self.emit_before(func, alloca, MirInst::Alloca { ty: MirType::Ptr });
                    let extent =
                        self.emit_before(func, alloca, MirInst::Alloca { ty: MirType::I64 });
                    self.state
                        .shadows
                        .insert(alloca, ShadowSlots { lower, extent });
                    if self.ctx.trace() {
                        debug!(local = %alloca, "shadow slots allocated");
                    }
                }
                _ => {}
            }
        }
    }

    fn propagate(&mut self, func: &mut MirFunction) {
        while let Some(front) = self.worklist.pop_front() {
            if !self.visited.insert(front) {
                continue;
            }
            let Some(pair) = self.state.get(front) else {
                continue;
            };

            for user in func.users(front) {
                if self.state.is_synthesized(user) {
                    continue;
                }
                match func.inst(user).clone() {
                    MirInst::Phi { .. } => self.reach_merge(func, user, front, pair),
                    MirInst::Store { ptr, val } => {
                        if val.id() == Some(front)
                            && let Some(local) = ptr.as_inst()
                            && let Some(shadow) = self.state.shadow_slots(local)
                        {
                            self.spill_to_shadow(func, user, local, shadow, pair);
                        }
                    }
                    MirInst::Call { .. } => self.repack_call_arguments(func, user, front, pair),
                    other => {
                        if other.has_result() {
                            self.record(func, ValueId::Inst(user), pair);
                        }
                    }
                }
            }
        }
    }

    /// Deliver `pair` into the lower/extent phis of `merge`, creating them on first arrival
    fn reach_merge(&mut self, func: &mut MirFunction, merge: InstId, front: ValueId, pair: BoundsPair) {
        let MirInst::Phi { incoming, .. } = func.inst(merge) else {
            return;
        };
        let preds: Vec<BlockId> = incoming.iter().map(|(block, _)| *block).collect();
        let slots: Vec<usize> = incoming
            .iter()
            .enumerate()
            .filter(|(_, (_, value))| value.id() == Some(front))
            .map(|(slot, _)| slot)
            .collect();

        let phis = match self.state.merge_bounds(merge) {
            Some(phis) => phis,
            None => {
                let placeholder = |ty: MirType| MirInst::Phi {
                    ty,
                    incoming: preds.iter().map(|&block| (block, MirValue::Zero)).collect(),
                };
                let lower = self.emit_after(func, merge, placeholder(MirType::Ptr));
                let extent = self.emit_after(func, lower, placeholder(MirType::I64));
                let phis = MergeBounds { lower, extent };
                self.state.merges.insert(merge, phis);
                self.record(
                    func,
                    ValueId::Inst(merge),
                    BoundsPair::new(lower.into(), extent.into()),
                );
                phis
            }
        };

        for slot in slots {
            if !self.state.filled_slots.insert((merge, slot)) {
                continue;
            }
            set_incoming(func, phis.lower, slot, pair.lower);
            set_incoming(func, phis.extent, slot, pair.extent);
        }
    }

    /// Argument positions of `call` the callee unpacks from a `{ raw, lower, extent }` triple
    ///
    /// Only defined, non-raw-ABI callees unpack, and only their pointer
    /// parameters. Positions already packed are skipped.
    fn fat_pointer_positions(&self, func: &MirFunction, call: InstId) -> Vec<usize> {
        let MirInst::Call { callee, args, .. } = func.inst(call) else {
            return Vec::new();
        };
        let Some(name) = callee.name() else {
            if self.ctx.trace() {
                debug!(call = %call, "indirect call keeps raw pointer");
            }
            return Vec::new();
        };
        if !self.ctx.symbols.is_defined(name) || self.ctx.config.is_raw_abi(name) {
            return Vec::new();
        }
        let signature = self.ctx.symbols.signature(name);
        args.iter()
            .enumerate()
            .filter(|(pos, arg)| {
                func.value_type(arg).is_pointer()
                    && signature.is_none_or(|params| {
                        params.get(*pos).is_some_and(MirType::is_pointer)
                    })
                    && !self.state.packed_args.contains(&(call, *pos))
            })
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Re-pack each pointer argument position holding `front` into a fresh triple
    fn repack_call_arguments(
        &mut self,
        func: &mut MirFunction,
        call: InstId,
        front: ValueId,
        pair: BoundsPair,
    ) {
        for pos in self.fat_pointer_positions(func, call) {
            if call_argument(func, call, pos).and_then(|arg| arg.id()) == Some(front) {
                self.pack_argument(func, call, pos, front.into(), pair);
            }
        }
    }

    /// Pointer arguments no fact reached still cross the call as triples
    fn pack_unbounded_arguments(&mut self, func: &mut MirFunction) {
        let calls: Vec<InstId> = func
            .layout()
            .filter(|&id| !self.state.is_synthesized(id))
            .filter(|&id| matches!(func.inst(id), MirInst::Call { .. }))
            .collect();

        for call in calls {
            for pos in self.fat_pointer_positions(func, call) {
                let Some(arg) = call_argument(func, call, pos) else {
                    continue;
                };
                let pair = arg
                    .id()
                    .and_then(|value| self.state.get(value))
                    .unwrap_or_else(BoundsPair::unbounded);
                if self.ctx.trace() {
                    debug!(call = %call, pos, "pointer argument packed without bounds");
                }
                self.pack_argument(func, call, pos, arg, pair);
            }
        }
    }

    /// Store `value` and `pair` into a fresh entry triple and pass its address at `pos`
    fn pack_argument(
        &mut self,
        func: &mut MirFunction,
        call: InstId,
        pos: usize,
        value: MirValue,
        pair: BoundsPair,
    ) {
        let triple_ty = MirType::fat_pointer();
        let entry = func.entry;
        let mut at = func.entry_insertion_index();
        let triple = self.emit_at(
            func,
            entry,
            &mut at,
            MirInst::Alloca {
                ty: triple_ty.clone(),
            },
        );
        let lower_addr = self.emit_before(
            func,
            call,
            MirInst::FieldAddr {
                base: triple.into(),
                ty: triple_ty.clone(),
                index: 1,
            },
        );
        let extent_addr = self.emit_before(
            func,
            call,
            MirInst::FieldAddr {
                base: triple.into(),
                ty: triple_ty,
                index: 2,
            },
        );
        self.emit_before(
            func,
            call,
            MirInst::Store {
                ptr: triple.into(),
                val: value,
            },
        );
        self.emit_before(
            func,
            call,
            MirInst::Store {
                ptr: lower_addr.into(),
                val: pair.lower,
            },
        );
        self.emit_before(
            func,
            call,
            MirInst::Store {
                ptr: extent_addr.into(),
                val: pair.extent,
            },
        );
        if let MirInst::Call { args, .. } = func.inst_mut(call)
            && let Some(arg) = args.get_mut(pos)
        {
            *arg = triple.into();
        }
        self.state.packed_args.insert((call, pos));
    }

    /// Write `pair` to the shadow slots of `local` and reload it at every load
    fn spill_to_shadow(
        &mut self,
        func: &mut MirFunction,
        store: InstId,
        local: InstId,
        shadow: ShadowSlots,
        pair: BoundsPair,
    ) {
        self.emit_before(
            func,
            store,
            MirInst::Store {
                ptr: shadow.lower.into(),
                val: pair.lower,
            },
        );
        self.emit_before(
            func,
            store,
            MirInst::Store {
                ptr: shadow.extent.into(),
                val: pair.extent,
            },
        );
        self.state.spilled_stores.insert(store);

        for load in func.users(ValueId::Inst(local)) {
            if self.state.is_synthesized(load) {
                continue;
            }
            let MirInst::Load { ptr, .. } = func.inst(load) else {
                continue;
            };
            if ptr.as_inst() != Some(local) || !self.state.reloaded_loads.insert(load) {
                continue;
            }
            let lower = self.emit_before(
                func,
                load,
                MirInst::Load {
                    ptr: shadow.lower.into(),
                    ty: MirType::Ptr,
                },
            );
            let extent = self.emit_before(
                func,
                load,
                MirInst::Load {
                    ptr: shadow.extent.into(),
                    ty: MirType::I64,
                },
            );
            self.record(
                func,
                ValueId::Inst(load),
                BoundsPair::new(lower.into(), extent.into()),
            );
        }
    }

    /// Merge slots no fact ever reached read as unbounded
    fn finalize_merges(&mut self, func: &mut MirFunction) {
        let unbounded = BoundsPair::unbounded();
        let mut merges: Vec<(InstId, MergeBounds)> =
            self.state.merges.iter().map(|(&m, &p)| (m, p)).collect();
        merges.sort_by_key(|(merge, _)| *merge);

        for (merge, phis) in merges {
            let arity = match func.inst(merge) {
                MirInst::Phi { incoming, .. } => incoming.len(),
                _ => 0,
            };
            for slot in 0..arity {
                if !self.state.filled_slots.insert((merge, slot)) {
                    continue;
                }
                set_incoming(func, phis.lower, slot, unbounded.lower);
                set_incoming(func, phis.extent, slot, unbounded.extent);
                if self.ctx.trace() {
                    debug!(merge = %merge, slot, "merge slot left unbounded");
                }
            }
        }
    }

    /// Initialize reloaded shadow slots and reset them on untracked stores
    fn finalize_shadow_slots(&mut self, func: &mut MirFunction) {
        let unbounded = BoundsPair::unbounded();
        let mut locals: Vec<InstId> = self
            .state
            .reloaded_loads
            .iter()
            .filter_map(|&load| match func.inst(load) {
                MirInst::Load { ptr, .. } => ptr.as_inst(),
                _ => None,
            })
            .collect();
        locals.sort();
        locals.dedup();

        for local in locals {
            let Some(shadow) = self.state.shadow_slots(local) else {
                continue;
            };
            let init = self.emit_after(
                func,
                local,
                MirInst::Store {
                    ptr: shadow.lower.into(),
                    val: unbounded.lower,
                },
            );
            self.emit_after(
                func,
                init,
                MirInst::Store {
                    ptr: shadow.extent.into(),
                    val: unbounded.extent,
                },
            );

            for store in func.users(ValueId::Inst(local)) {
                if self.state.is_synthesized(store) || self.state.spilled_stores.contains(&store) {
                    continue;
                }
                let MirInst::Store { ptr, .. } = func.inst(store) else {
                    continue;
                };
                if ptr.as_inst() != Some(local) {
                    continue;
                }
                warn!(
                    function = %func.name,
                    store = %func.display_inst(store),
                    "store into tracked pointer local has no bounds; resetting to unbounded"
                );
                self.emit_before(
                    func,
                    store,
                    MirInst::Store {
                        ptr: shadow.lower.into(),
                        val: unbounded.lower,
                    },
                );
                self.emit_before(
                    func,
                    store,
                    MirInst::Store {
                        ptr: shadow.extent.into(),
                        val: unbounded.extent,
                    },
                );
            }
        }
    }
}

fn call_argument(func: &MirFunction, call: InstId, pos: usize) -> Option<MirValue> {
    match func.inst(call) {
        MirInst::Call { args, .. } => args.get(pos).copied(),
        _ => None,
    }
}

/// Overwrite the operand of incoming slot `slot` of a phi
fn set_incoming(func: &mut MirFunction, phi: InstId, slot: usize, value: MirValue) {
    if let MirInst::Phi { incoming, .. } = func.inst_mut(phi)
        && let Some(entry) = incoming.get_mut(slot)
    {
        entry.1 = value;
    }
}
