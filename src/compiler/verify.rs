//! Structural MIR verifier
//!
//! Run after instrumentation to catch malformed output early: placeholder or
//! misplaced terminators, instructions placed twice, operands that reference
//! nothing, and phis out of sync with their block's predecessors.

use std::collections::HashSet;

use thiserror::Error;

use super::cfg::CFG;
use super::mir::{BlockId, InstId, MirFunction, MirInst, MirValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("entry block {0} does not exist")]
    MissingEntry(BlockId),

    #[error("block {0} has no terminator")]
    MissingTerminator(BlockId),

    #[error("block {block} ends with non-terminator {inst}")]
    NotATerminator { block: BlockId, inst: InstId },

    #[error("terminator {inst} in the body of block {block}")]
    TerminatorInBody { block: BlockId, inst: InstId },

    #[error("{inst} in block {block} targets unknown block {target}")]
    UnknownBlock {
        block: BlockId,
        inst: InstId,
        target: BlockId,
    },

    #[error("{0} is placed more than once")]
    DuplicatePlacement(InstId),

    #[error("{inst} uses {operand}, which is not placed in any block")]
    DanglingOperand { inst: InstId, operand: InstId },

    #[error("{inst} uses parameter %arg{index}, but the function has {count}")]
    UnknownParam { inst: InstId, index: u32, count: usize },

    #[error("phi {inst} in block {block} follows a non-phi instruction")]
    MisplacedPhi { block: BlockId, inst: InstId },

    #[error("phi {inst} in block {block} lists {listed:?}, predecessors are {expected:?}")]
    PhiPredecessorMismatch {
        block: BlockId,
        inst: InstId,
        listed: Vec<BlockId>,
        expected: Vec<BlockId>,
    },
}

/// Check the structural invariants of `func`
pub fn verify_function(func: &MirFunction) -> Result<(), VerifyError> {
    if !func.has_block(func.entry) {
        return Err(VerifyError::MissingEntry(func.entry));
    }

    // Placement and terminators
    let mut placed = HashSet::new();
    for block in &func.blocks {
        let mut past_phis = false;
        for &id in &block.instructions {
            if !placed.insert(id) {
                return Err(VerifyError::DuplicatePlacement(id));
            }
            let inst = func.inst(id);
            if inst.is_terminator() || matches!(inst, MirInst::Placeholder) {
                return Err(VerifyError::TerminatorInBody {
                    block: block.id,
                    inst: id,
                });
            }
            if inst.is_phi() {
                if past_phis {
                    return Err(VerifyError::MisplacedPhi {
                        block: block.id,
                        inst: id,
                    });
                }
            } else {
                past_phis = true;
            }
        }

        if !placed.insert(block.terminator) {
            return Err(VerifyError::DuplicatePlacement(block.terminator));
        }
        let term = func.inst(block.terminator);
        if matches!(term, MirInst::Placeholder) {
            return Err(VerifyError::MissingTerminator(block.id));
        }
        if !term.is_terminator() {
            return Err(VerifyError::NotATerminator {
                block: block.id,
                inst: block.terminator,
            });
        }
        for target in term.successors() {
            if !func.has_block(target) {
                return Err(VerifyError::UnknownBlock {
                    block: block.id,
                    inst: block.terminator,
                    target,
                });
            }
        }
    }

    // Operands and phi edges
    let cfg = CFG::build(func);
    for block in &func.blocks {
        let ids = block
            .instructions
            .iter()
            .copied()
            .chain(std::iter::once(block.terminator));
        for id in ids {
            let inst = func.inst(id);
            for operand in inst.operands() {
                match operand {
                    MirValue::Inst(def) if !placed.contains(&def) => {
                        return Err(VerifyError::DanglingOperand {
                            inst: id,
                            operand: def,
                        });
                    }
                    MirValue::Param(index) if index as usize >= func.params.len() => {
                        return Err(VerifyError::UnknownParam {
                            inst: id,
                            index,
                            count: func.params.len(),
                        });
                    }
                    _ => {}
                }
            }

            if let MirInst::Phi { incoming, .. } = inst {
                let mut listed: Vec<BlockId> = incoming.iter().map(|(pred, _)| *pred).collect();
                let mut expected = cfg.predecessors_of(block.id).to_vec();
                listed.sort();
                expected.sort();
                if listed != expected {
                    return Err(VerifyError::PhiPredecessorMismatch {
                        block: block.id,
                        inst: id,
                        listed,
                        expected,
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
