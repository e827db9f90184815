use std::collections::HashMap;

use super::*;

impl MirFunction {
    /// Create a new empty MIR function
    pub fn new(name: impl Into<String>, ret_ty: MirType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret_ty,
            blocks: Vec::new(),
            entry: BlockId(0),
            insts: Vec::new(),
        }
    }

    /// Append a formal parameter and return it as an operand
    pub fn add_param(&mut self, name: impl Into<String>, ty: MirType) -> MirValue {
        let idx = self.params.len() as u32;
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        MirValue::Param(idx)
    }

    /// Allocate a new basic block terminated by a placeholder
    pub fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let terminator = self.alloc_inst(MirInst::Placeholder);
        self.blocks.push(BasicBlock {
            id,
            instructions: Vec::new(),
            terminator,
        });
        id
    }

    /// Allocate an instruction in the arena without placing it in a block
    pub fn alloc_inst(&mut self, inst: MirInst) -> InstId {
        let ty = inst.result_type(self);
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstData { inst, ty });
        id
    }

    /// Get a mutable reference to a block
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        let idx = id.0 as usize;
        let fast_path = self.blocks.get(idx).is_some_and(|b| b.id == id);
        if fast_path {
            return &mut self.blocks[idx];
        }
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("Block {:?} not found", id))
    }

    /// Get a reference to a block
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        let idx = id.0 as usize;
        if let Some(block) = self.blocks.get(idx)
            && block.id == id
        {
            return block;
        }
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("Block {:?} not found", id))
    }

    /// Check if a block exists
    pub fn has_block(&self, id: BlockId) -> bool {
        let idx = id.0 as usize;
        if self.blocks.get(idx).is_some_and(|b| b.id == id) {
            return true;
        }
        self.blocks.iter().any(|b| b.id == id)
    }

    pub fn inst(&self, id: InstId) -> &MirInst {
        &self.data(id).inst
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut MirInst {
        &mut self.insts[id.0 as usize].inst
    }

    pub fn data(&self, id: InstId) -> &InstData {
        self.insts
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("Instruction {} not found", id))
    }

    /// Type of an operand
    pub fn value_type(&self, value: &MirValue) -> MirType {
        match value {
            MirValue::Inst(id) => self.data(*id).ty.clone(),
            MirValue::Param(idx) => self
                .params
                .get(*idx as usize)
                .map(|p| p.ty.clone())
                .unwrap_or(MirType::Void),
            MirValue::Const(_) => MirType::I64,
            MirValue::Zero => MirType::Ptr,
        }
    }

    /// Append an instruction to the body of a block
    pub fn push(&mut self, block: BlockId, inst: MirInst) -> InstId {
        let id = self.alloc_inst(inst);
        self.block_mut(block).instructions.push(id);
        id
    }

    /// Insert an instruction at `index` in the body of a block
    pub fn insert_at(&mut self, block: BlockId, index: usize, inst: MirInst) -> InstId {
        let id = self.alloc_inst(inst);
        self.block_mut(block).instructions.insert(index, id);
        id
    }

    /// Insert an instruction immediately before `anchor`.
    ///
    /// A terminator anchor inserts at the end of the block body.
    pub fn insert_before(&mut self, anchor: InstId, inst: MirInst) -> InstId {
        let loc = self
            .position(anchor)
            .unwrap_or_else(|| panic!("Anchor {} is not placed in a block", anchor));
        self.insert_at(loc.block, loc.index, inst)
    }

    /// Insert an instruction immediately after `anchor` (which must not be a terminator)
    pub fn insert_after(&mut self, anchor: InstId, inst: MirInst) -> InstId {
        let loc = self
            .position(anchor)
            .unwrap_or_else(|| panic!("Anchor {} is not placed in a block", anchor));
        assert!(
            loc.index < self.block(loc.block).instructions.len(),
            "cannot insert after terminator {}",
            anchor
        );
        self.insert_at(loc.block, loc.index + 1, inst)
    }

    /// Replace the terminator of a block, keeping the terminator's identity
    pub fn set_terminator(&mut self, block: BlockId, inst: MirInst) {
        debug_assert!(inst.is_terminator(), "not a terminator: {:?}", inst);
        let term = self.block(block).terminator;
        self.insts[term.0 as usize] = InstData {
            inst,
            ty: MirType::Void,
        };
    }

    /// Locate a placed instruction
    pub fn position(&self, id: InstId) -> Option<Location> {
        for block in &self.blocks {
            if block.terminator == id {
                return Some(Location {
                    block: block.id,
                    index: block.instructions.len(),
                });
            }
            if let Some(index) = block.instructions.iter().position(|&i| i == id) {
                return Some(Location {
                    block: block.id,
                    index,
                });
            }
        }
        None
    }

    /// Index in the entry block just past its leading phis and allocas
    pub fn entry_insertion_index(&self) -> usize {
        self.block(self.entry)
            .instructions
            .iter()
            .take_while(|&&id| matches!(self.inst(id), MirInst::Alloca { .. } | MirInst::Phi { .. }))
            .count()
    }

    /// All placed instructions in layout order, terminators included
    pub fn layout(&self) -> impl Iterator<Item = InstId> + '_ {
        self.blocks.iter().flat_map(|block| {
            block
                .instructions
                .iter()
                .copied()
                .chain(std::iter::once(block.terminator))
        })
    }

    /// Placed instructions using `value` as an operand, in layout order
    pub fn users(&self, value: ValueId) -> Vec<InstId> {
        self.layout()
            .filter(|&id| self.inst(id).uses_value(value))
            .collect()
    }

    /// Def-use index over the current layout: value -> users in layout order.
    ///
    /// Only valid until the function is next mutated.
    pub fn use_map(&self) -> HashMap<ValueId, Vec<InstId>> {
        let mut uses: HashMap<ValueId, Vec<InstId>> = HashMap::new();
        for id in self.layout() {
            let mut seen = self.inst(id).value_uses();
            seen.sort();
            seen.dedup();
            for value in seen {
                uses.entry(value).or_default().push(id);
            }
        }
        uses
    }

    /// Successor blocks named by a block's terminator
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.inst(self.block(block).terminator).successors()
    }

    /// Predecessor blocks of `block`, in layout order, one entry per edge
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let mut preds = Vec::new();
        for candidate in &self.blocks {
            for succ in self.successors(candidate.id) {
                if succ == block {
                    preds.push(candidate.id);
                }
            }
        }
        preds
    }

    /// Split the block containing `anchor` so that `anchor` starts a new block.
    ///
    /// The head keeps its identity, phis and predecessors and ends with a jump
    /// to the new tail, which inherits the original terminator. Phis in the
    /// tail's successors are retargeted from the head to the tail.
    pub fn split_block_before(&mut self, anchor: InstId) -> BlockId {
        let loc = self
            .position(anchor)
            .unwrap_or_else(|| panic!("Anchor {} is not placed in a block", anchor));

        let tail_id = BlockId(self.blocks.len() as u32);
        let jump = self.alloc_inst(MirInst::Jump { target: tail_id });
        let (rest, old_term) = {
            let head = self.block_mut(loc.block);
            let rest = head.instructions.split_off(loc.index);
            let old_term = std::mem::replace(&mut head.terminator, jump);
            (rest, old_term)
        };

        self.blocks.push(BasicBlock {
            id: tail_id,
            instructions: rest,
            terminator: old_term,
        });

        for succ in self.successors(tail_id) {
            self.retarget_phis(succ, loc.block, tail_id);
        }

        tail_id
    }

    /// Rewrite phi incoming edges in `block` from `from` to `to`
    fn retarget_phis(&mut self, block: BlockId, from: BlockId, to: BlockId) {
        let phis: Vec<InstId> = self
            .block(block)
            .instructions
            .iter()
            .copied()
            .take_while(|&id| matches!(self.inst(id), MirInst::Phi { .. }))
            .collect();
        for phi in phis {
            if let MirInst::Phi { incoming, .. } = self.inst_mut(phi) {
                for (pred, _) in incoming.iter_mut() {
                    if *pred == from {
                        *pred = to;
                    }
                }
            }
        }
    }
}

impl MirModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function body
    pub fn add_function(&mut self, func: MirFunction) {
        self.functions.push(func);
    }

    /// Add an external declaration
    pub fn declare(&mut self, name: impl Into<String>, params: Vec<MirType>, ret_ty: MirType) {
        self.declarations.push(FunctionDecl {
            name: name.into(),
            params,
            ret_ty,
        });
    }

    pub fn function(&self, name: &str) -> Option<&MirFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut MirFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }
}
