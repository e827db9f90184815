use super::*;

/// Textual form of a placed instruction, e.g. `%4 = load ptr, %2`
pub struct InstDisplay<'a> {
    func: &'a MirFunction,
    id: InstId,
}

impl MirFunction {
    pub fn display_inst(&self, id: InstId) -> InstDisplay<'_> {
        InstDisplay { func: self, id }
    }

    /// Textual form of a graph node: its defining instruction or its parameter
    pub fn describe_value(&self, value: ValueId) -> String {
        match value {
            ValueId::Inst(id) => self.display_inst(id).to_string(),
            ValueId::Param(idx) => match self.params.get(idx as usize) {
                Some(param) => format!("{} %arg{} ({})", param.ty, idx, param.name),
                None => format!("%arg{}", idx),
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[MirValue]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

impl fmt::Display for InstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inst = self.func.inst(self.id);
        if inst.has_result() {
            write!(f, "{} = ", self.id)?;
        }
        match inst {
            MirInst::Alloca { ty } => write!(f, "alloca {}", ty),
            MirInst::Load { ptr, ty } => write!(f, "load {}, {}", ty, ptr),
            MirInst::Store { ptr, val } => write!(f, "store {}, {}", val, ptr),
            MirInst::FieldAddr { base, ty, index } => {
                write!(f, "field_addr {}, {}, {}", ty, base, index)
            }
            MirInst::BinOp { op, lhs, rhs } => write!(f, "{} {}, {}", op, lhs, rhs),
            MirInst::Cmp { pred, lhs, rhs } => write!(f, "cmp {} {}, {}", pred, lhs, rhs),
            MirInst::PtrToInt { src } => write!(f, "ptrtoint {}", src),
            MirInst::Copy { src } => write!(f, "copy {}", src),
            MirInst::Call { callee, args, ret } => {
                match callee {
                    Callee::Direct(name) => write!(f, "call {} @{}(", ret, name)?,
                    Callee::Indirect(target) => write!(f, "call {} {}(", ret, target)?,
                }
                write_list(f, args)?;
                write!(f, ")")
            }
            MirInst::Phi { ty, incoming } => {
                write!(f, "phi {}", ty)?;
                for (i, (block, value)) in incoming.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}[{}: {}]", sep, block, value)?;
                }
                Ok(())
            }
            MirInst::Trap => write!(f, "trap"),
            MirInst::Jump { target } => write!(f, "jmp {}", target),
            MirInst::Branch {
                cond,
                if_true,
                if_false,
            } => write!(f, "br {}, {}, {}", cond, if_true, if_false),
            MirInst::Return { val: Some(value) } => write!(f, "ret {}", value),
            MirInst::Return { val: None } => write!(f, "ret void"),
            MirInst::Placeholder => write!(f, "<placeholder>"),
        }
    }
}

impl fmt::Display for MirFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %arg{}", param.ty, i)?;
        }
        writeln!(f, ") -> {} {{", self.ret_ty)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.id)?;
            for &id in &block.instructions {
                writeln!(f, "    {}", self.display_inst(id))?;
            }
            writeln!(f, "    {}", self.display_inst(block.terminator))?;
        }
        writeln!(f, "}}")
    }
}
