//! Control Flow Graph construction and analysis
//!
//! This module builds a CFG from MIR and provides:
//! - Predecessor/successor relationships
//! - Reverse post-order and post-order traversals
//! - Dominator tree and instruction-level dominance queries

use std::collections::{HashMap, HashSet};

use super::mir::{BlockId, InstId, MirFunction};

mod analysis;

/// Control Flow Graph built from MIR
#[derive(Debug, Clone)]
pub struct CFG {
    /// Entry block
    pub entry: BlockId,
    /// Predecessors for each block, one entry per edge
    pub predecessors: HashMap<BlockId, Vec<BlockId>>,
    /// Successors for each block (computed from terminators)
    pub successors: HashMap<BlockId, Vec<BlockId>>,
    /// Immediate dominator for each reachable non-entry block
    pub idom: HashMap<BlockId, BlockId>,
    /// Reverse post-order traversal
    pub rpo: Vec<BlockId>,
    /// Post-order traversal
    pub post_order: Vec<BlockId>,
}

impl CFG {
    /// Build a CFG from a MIR function
    pub fn build(func: &MirFunction) -> Self {
        let mut cfg = CFG {
            entry: func.entry,
            predecessors: HashMap::new(),
            successors: HashMap::new(),
            idom: HashMap::new(),
            rpo: Vec::new(),
            post_order: Vec::new(),
        };

        for block in &func.blocks {
            cfg.predecessors.insert(block.id, Vec::new());
            cfg.successors.insert(block.id, Vec::new());
        }

        for block in &func.blocks {
            let succs = func.successors(block.id);
            cfg.successors.insert(block.id, succs.clone());
            for succ in succs {
                cfg.predecessors.entry(succ).or_default().push(block.id);
            }
        }

        cfg.compute_post_order(func);
        if !func.blocks.is_empty() {
            cfg.idom = analysis::compute_idom(cfg.entry, &cfg.predecessors, &cfg.rpo);
        }
        cfg
    }

    /// Check if block A dominates block B
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        analysis::dominates_in_idom(a, b, &self.idom)
    }

    /// Check if instruction `a` dominates instruction `b` (both placed in `func`)
    pub fn inst_dominates(&self, func: &MirFunction, a: InstId, b: InstId) -> bool {
        let (Some(loc_a), Some(loc_b)) = (func.position(a), func.position(b)) else {
            return false;
        };
        if loc_a.block == loc_b.block {
            return loc_a.index <= loc_b.index;
        }
        self.dominates(loc_a.block, loc_b.block)
    }

    /// Get all blocks reachable from entry
    pub fn reachable_blocks(&self) -> HashSet<BlockId> {
        self.rpo.iter().copied().collect()
    }

    pub fn predecessors_of(&self, block: BlockId) -> &[BlockId] {
        self.predecessors
            .get(&block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests;
