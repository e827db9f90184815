use super::*;

impl MirInst {
    /// Returns true if this instruction is a terminator
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            MirInst::Jump { .. } | MirInst::Branch { .. } | MirInst::Return { .. }
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, MirInst::Phi { .. })
    }

    /// Get successor block IDs named by a terminator
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            MirInst::Jump { target } => vec![*target],
            MirInst::Branch {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            _ => vec![],
        }
    }

    /// Whether the instruction produces a usable (non-void) value
    pub fn has_result(&self) -> bool {
        match self {
            MirInst::Store { .. }
            | MirInst::Trap
            | MirInst::Jump { .. }
            | MirInst::Branch { .. }
            | MirInst::Return { .. }
            | MirInst::Placeholder => false,
            MirInst::Call { ret, .. } => *ret != MirType::Void,
            _ => true,
        }
    }

    /// Type of the value this instruction produces
    pub fn result_type(&self, func: &MirFunction) -> MirType {
        match self {
            MirInst::Alloca { .. } | MirInst::FieldAddr { .. } => MirType::Ptr,
            MirInst::Load { ty, .. } | MirInst::Phi { ty, .. } => ty.clone(),
            MirInst::BinOp { lhs, .. } => match func.value_type(lhs) {
                MirType::Ptr => MirType::I64,
                ty => ty,
            },
            MirInst::Cmp { .. } => MirType::I1,
            MirInst::PtrToInt { .. } => MirType::I64,
            MirInst::Copy { src } => func.value_type(src),
            MirInst::Call { ret, .. } => ret.clone(),
            MirInst::Store { .. }
            | MirInst::Trap
            | MirInst::Jump { .. }
            | MirInst::Branch { .. }
            | MirInst::Return { .. }
            | MirInst::Placeholder => MirType::Void,
        }
    }

    /// Visit all operands of this instruction.
    ///
    /// Phi operands and indirect callees are included; block targets are not.
    pub fn visit_operands_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut MirValue),
    {
        match self {
            MirInst::Alloca { .. } => {}
            MirInst::Load { ptr, .. } => f(ptr),
            MirInst::Store { ptr, val } => {
                f(ptr);
                f(val);
            }
            MirInst::FieldAddr { base, .. } => f(base),
            MirInst::BinOp { lhs, rhs, .. } | MirInst::Cmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            MirInst::PtrToInt { src } | MirInst::Copy { src } => f(src),
            MirInst::Call { callee, args, .. } => {
                if let Callee::Indirect(target) = callee {
                    f(target);
                }
                for arg in args {
                    f(arg);
                }
            }
            MirInst::Phi { incoming, .. } => {
                for (_, value) in incoming {
                    f(value);
                }
            }
            MirInst::Branch { cond, .. } => f(cond),
            MirInst::Return { val } => {
                if let Some(value) = val {
                    f(value);
                }
            }
            MirInst::Trap | MirInst::Jump { .. } | MirInst::Placeholder => {}
        }
    }

    /// Returns all operands used by this instruction
    pub fn operands(&self) -> Vec<MirValue> {
        let mut operands = Vec::new();
        let mut cloned = self.clone();
        cloned.visit_operands_mut(|value| operands.push(*value));
        operands
    }

    /// Returns the graph nodes used by this instruction (constants skipped)
    pub fn value_uses(&self) -> Vec<ValueId> {
        self.operands().iter().filter_map(MirValue::id).collect()
    }

    pub fn uses_value(&self, value: ValueId) -> bool {
        self.operands().iter().any(|op| op.id() == Some(value))
    }

    /// Rewrite every operand equal to `old` into `new`; returns true if any changed
    pub fn replace_operand(&mut self, old: ValueId, new: MirValue) -> bool {
        let mut changed = false;
        self.visit_operands_mut(|value| {
            if value.id() == Some(old) {
                *value = new;
                changed = true;
            }
        });
        changed
    }
}
