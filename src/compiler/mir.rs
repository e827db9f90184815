//! Mid-Level Intermediate Representation (MIR) consumed by the guard passes
//!
//! The MIR is an SSA form where every instruction is also the value it
//! produces:
//! - Instructions live in a per-function arena and are addressed by a stable
//!   [`InstId`] that survives block splitting and reordering
//! - Explicit basic blocks with a separate terminator
//! - Phi nodes at the start of join blocks, one operand per predecessor edge
//! - Formal parameters are values addressed by index

use std::collections::{HashMap, HashSet};
use std::fmt;

mod display;
mod function_impl;
mod inst_impl;

pub use display::InstDisplay;

/// Instruction identifier - an index into the owning function's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Basic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Identity of a node in the def-use graph.
///
/// Constants have no identity and therefore never carry analysis facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueId {
    /// Formal parameter by position
    Param(u32),
    /// Result of an instruction
    Inst(InstId),
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueId::Param(idx) => write!(f, "%arg{}", idx),
            ValueId::Inst(id) => write!(f, "{}", id),
        }
    }
}

/// Value that can be used as an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirValue {
    /// Result of an instruction
    Inst(InstId),
    /// Formal parameter
    Param(u32),
    /// Integer constant (interpreted per use site; all ones reads as u64::MAX)
    Const(i64),
    /// All-zero constant of the surrounding type (null for pointers)
    Zero,
}

impl MirValue {
    /// Identity of this operand, if it is a graph node rather than a constant
    pub fn id(&self) -> Option<ValueId> {
        match self {
            MirValue::Inst(id) => Some(ValueId::Inst(*id)),
            MirValue::Param(idx) => Some(ValueId::Param(*idx)),
            MirValue::Const(_) | MirValue::Zero => None,
        }
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            MirValue::Inst(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<ValueId> for MirValue {
    fn from(value: ValueId) -> Self {
        match value {
            ValueId::Param(idx) => MirValue::Param(idx),
            ValueId::Inst(id) => MirValue::Inst(id),
        }
    }
}

impl From<InstId> for MirValue {
    fn from(id: InstId) -> Self {
        MirValue::Inst(id)
    }
}

impl fmt::Display for MirValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirValue::Inst(id) => write!(f, "{}", id),
            MirValue::Param(idx) => write!(f, "%arg{}", idx),
            MirValue::Const(c) => write!(f, "{}", c),
            MirValue::Zero => write!(f, "zeroinit"),
        }
    }
}

/// MIR type system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MirType {
    Void,
    I1,
    I8,
    I32,
    I64,
    /// Opaque pointer
    Ptr,
    /// Fixed-size array
    Array {
        elem: Box<MirType>,
        len: usize,
    },
    /// Anonymous struct, fields laid out in order without padding
    Struct {
        fields: Vec<MirType>,
    },
}

impl MirType {
    /// Size in bytes
    pub fn size(&self) -> usize {
        match self {
            MirType::Void => 0,
            MirType::I1 | MirType::I8 => 1,
            MirType::I32 => 4,
            MirType::I64 | MirType::Ptr => 8,
            MirType::Array { elem, len } => elem.size() * len,
            MirType::Struct { fields } => fields.iter().map(MirType::size).sum(),
        }
    }

    pub fn array(elem: MirType, len: usize) -> Self {
        MirType::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// Packed (raw pointer, lower bound, extent) triple passed across calls
    pub fn fat_pointer() -> Self {
        MirType::Struct {
            fields: vec![MirType::Ptr, MirType::Ptr, MirType::I64],
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, MirType::Ptr)
    }

    /// Value returned on the fault path of a function with this return type
    pub fn zero_value(&self) -> Option<MirValue> {
        match self {
            MirType::Void => None,
            MirType::I1 | MirType::I8 | MirType::I32 | MirType::I64 => Some(MirValue::Const(0)),
            MirType::Ptr | MirType::Array { .. } | MirType::Struct { .. } => Some(MirValue::Zero),
        }
    }
}

impl fmt::Display for MirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirType::Void => write!(f, "void"),
            MirType::I1 => write!(f, "i1"),
            MirType::I8 => write!(f, "i8"),
            MirType::I32 => write!(f, "i32"),
            MirType::I64 => write!(f, "i64"),
            MirType::Ptr => write!(f, "ptr"),
            MirType::Array { elem, len } => write!(f, "[{} x {}]", len, elem),
            MirType::Struct { fields } => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Binary arithmetic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOpKind::Add => "add",
            BinOpKind::Sub => "sub",
            BinOpKind::Mul => "mul",
            BinOpKind::And => "and",
            BinOpKind::Or => "or",
            BinOpKind::Xor => "xor",
            BinOpKind::Shl => "shl",
            BinOpKind::Shr => "shr",
        };
        write!(f, "{}", s)
    }
}

/// Integer comparison predicates (result is i1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    /// Unsigned less-than
    Ult,
    Ule,
    Ugt,
    /// Unsigned greater-or-equal
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl fmt::Display for CmpPred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Ult => "ult",
            CmpPred::Ule => "ule",
            CmpPred::Ugt => "ugt",
            CmpPred::Uge => "uge",
            CmpPred::Slt => "slt",
            CmpPred::Sle => "sle",
            CmpPred::Sgt => "sgt",
            CmpPred::Sge => "sge",
        };
        write!(f, "{}", s)
    }
}

/// Call target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Call to a named function (defined or declared in the module)
    Direct(String),
    /// Call through a function pointer
    Indirect(MirValue),
}

impl Callee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Callee::Direct(name) => Some(name),
            Callee::Indirect(_) => None,
        }
    }
}

/// MIR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum MirInst {
    // Memory
    /// Stack allocation; result is a pointer to storage of type `ty`
    Alloca { ty: MirType },

    /// Load a value of type `ty` from memory
    Load { ptr: MirValue, ty: MirType },

    /// Store `val` to memory at `ptr`
    Store { ptr: MirValue, val: MirValue },

    /// Address of field `index` inside an aggregate of type `ty` at `base`
    FieldAddr {
        base: MirValue,
        ty: MirType,
        index: u32,
    },

    // Arithmetic
    /// Binary operation on 64-bit integers
    BinOp {
        op: BinOpKind,
        lhs: MirValue,
        rhs: MirValue,
    },

    /// Integer comparison
    Cmp {
        pred: CmpPred,
        lhs: MirValue,
        rhs: MirValue,
    },

    /// Pointer to 64-bit integer cast
    PtrToInt { src: MirValue },

    /// Copy (also stands in for bit casts)
    Copy { src: MirValue },

    /// Function call; result type is `ret`
    Call {
        callee: Callee,
        args: Vec<MirValue>,
        ret: MirType,
    },

    // SSA phi function
    /// Phi node - selects value based on incoming edge
    /// Must appear at the start of a block, before any non-phi instructions
    Phi {
        ty: MirType,
        /// (predecessor block, value from that predecessor)
        incoming: Vec<(BlockId, MirValue)>,
    },

    /// Abnormal termination with no cleanup
    Trap,

    // Control flow (terminators - must be last in block)
    /// Unconditional jump
    Jump { target: BlockId },

    /// Conditional branch
    Branch {
        cond: MirValue,
        if_true: BlockId,
        if_false: BlockId,
    },

    /// Return from function
    Return { val: Option<MirValue> },

    /// Placeholder terminator (not a real terminator, must be replaced)
    Placeholder,
}

/// Arena entry: an instruction and the type of the value it produces
#[derive(Debug, Clone)]
pub struct InstData {
    pub inst: MirInst,
    pub ty: MirType,
}

/// A basic block with instructions and a terminator
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Non-terminator instructions, phis first
    pub instructions: Vec<InstId>,
    /// Block terminator (must be Jump, Branch or Return once built)
    pub terminator: InstId,
}

/// Placement of an instruction: `index == instructions.len()` is the terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub block: BlockId,
    pub index: usize,
}

/// Formal parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: MirType,
}

/// A complete MIR function
#[derive(Debug, Clone)]
pub struct MirFunction {
    /// Function name (used for call resolution and diagnostics)
    pub name: String,
    /// Formal parameters; parameter `i` is `MirValue::Param(i)`
    pub params: Vec<Param>,
    /// Return type
    pub ret_ty: MirType,
    /// Basic blocks in layout order
    pub blocks: Vec<BasicBlock>,
    /// Entry block ID
    pub entry: BlockId,
    /// Instruction arena indexed by `InstId`
    pub insts: Vec<InstData>,
}

/// External function known only by its signature
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<MirType>,
    pub ret_ty: MirType,
}

/// A module: function bodies plus external declarations
#[derive(Debug, Clone, Default)]
pub struct MirModule {
    pub functions: Vec<MirFunction>,
    pub declarations: Vec<FunctionDecl>,
}

/// Names resolvable from call sites, split by whether a body is available
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    defined: HashSet<String>,
    declared: HashSet<String>,
    /// Parameter types of defined functions, when known
    signatures: HashMap<String, Vec<MirType>>,
}

impl SymbolTable {
    pub fn from_module(module: &MirModule) -> Self {
        Self {
            defined: module.functions.iter().map(|f| f.name.clone()).collect(),
            declared: module.declarations.iter().map(|d| d.name.clone()).collect(),
            signatures: module
                .functions
                .iter()
                .map(|f| (f.name.clone(), f.params.iter().map(|p| p.ty.clone()).collect()))
                .collect(),
        }
    }

    /// Parameter types of a defined function, if its signature is known
    pub fn signature(&self, name: &str) -> Option<&[MirType]> {
        self.signatures.get(name).map(Vec::as_slice)
    }

    /// Function has a body in the module
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name)
    }

    /// Function is known only by declaration
    pub fn is_declaration(&self, name: &str) -> bool {
        !self.defined.contains(name) && self.declared.contains(name)
    }

    pub fn define(&mut self, name: impl Into<String>) {
        self.defined.insert(name.into());
    }

    /// Define a function together with its parameter types
    pub fn define_signature(&mut self, name: impl Into<String>, params: Vec<MirType>) {
        let name = name.into();
        self.defined.insert(name.clone());
        self.signatures.insert(name, params);
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.declared.insert(name.into());
    }
}
