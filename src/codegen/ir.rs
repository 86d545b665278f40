//! Instruction set emitted by [`super::CodeGen`].
//!
//! Functions are in SSA form: every register is written exactly once.
//! Constants are kept in a per-function pool that is materialized before
//! the entry block runs, so a constant register dominates every block and
//! may feed a PHI from any edge.

use crate::error::ArithFault;
use std::fmt;

/// Handle to a register inside a [`Function`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub(crate) u32);

impl Reg {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle to a basic block inside a [`Function`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Machine-level type of a register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    Bool,
    I16,
    I32,
    I64,
    F64,
    Str,
}

impl IrType {
    pub fn is_integer(self) -> bool {
        matches!(self, IrType::I16 | IrType::I32 | IrType::I64)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IrType::Bool => "bool",
            IrType::I16 => "i16",
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::F64 => "f64",
            IrType::Str => "str",
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime content of a register
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
}

impl Scalar {
    pub fn ir_type(&self) -> IrType {
        match self {
            Scalar::Bool(_) => IrType::Bool,
            Scalar::I16(_) => IrType::I16,
            Scalar::I32(_) => IrType::I32,
            Scalar::I64(_) => IrType::I64,
            Scalar::F64(_) => IrType::F64,
            Scalar::Str(_) => IrType::Str,
        }
    }

    /// The all-zero content of a register of the given type
    pub fn zero(ty: IrType) -> Scalar {
        match ty {
            IrType::Bool => Scalar::Bool(false),
            IrType::I16 => Scalar::I16(0),
            IrType::I32 => Scalar::I32(0),
            IrType::I64 => Scalar::I64(0),
            IrType::F64 => Scalar::F64(0.0),
            IrType::Str => Scalar::Str(String::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I16(v) => Some(i64::from(*v)),
            Scalar::I32(v) => Some(i64::from(*v)),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "bool {}", v),
            Scalar::I16(v) => write!(f, "i16 {}", v),
            Scalar::I32(v) => write!(f, "i32 {}", v),
            Scalar::I64(v) => write!(f, "i64 {}", v),
            Scalar::F64(v) => write!(f, "f64 {:?}", v),
            Scalar::Str(v) => write!(f, "str {:?}", v),
        }
    }
}

/// Comparison predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpPred {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Lt => "lt",
            CmpPred::Le => "le",
            CmpPred::Gt => "gt",
            CmpPred::Ge => "ge",
        }
    }
}

/// Arithmetic opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "rem",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Not {
        dst: Reg,
        src: Reg,
    },
    And {
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    Or {
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    Cmp {
        dst: Reg,
        pred: CmpPred,
        lhs: Reg,
        rhs: Reg,
    },
    /// Wrapping arithmetic; dividing by zero traps
    Arith {
        dst: Reg,
        op: ArithOp,
        lhs: Reg,
        rhs: Reg,
    },
    /// Wrapping arithmetic that also reports overflow in a bool register
    CheckedArith {
        dst: Reg,
        overflow: Reg,
        op: ArithOp,
        lhs: Reg,
        rhs: Reg,
    },
    Select {
        dst: Reg,
        cond: Reg,
        on_true: Reg,
        on_false: Reg,
    },
    Convert {
        dst: Reg,
        src: Reg,
        to: IrType,
    },
    /// Conversion that reports a source outside the target's range
    CheckedConvert {
        dst: Reg,
        out_of_range: Reg,
        src: Reg,
        to: IrType,
    },
    /// -1, 0 or 1; floats are ordered by their total order
    ThreeWay {
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// Three-way compare of the first `len` bytes of two strings
    StrCmp {
        dst: Reg,
        lhs: Reg,
        lhs_len: Reg,
        rhs: Reg,
        rhs_len: Reg,
    },
    Format {
        dst: Reg,
        len: Reg,
        src: Reg,
    },
    Hash {
        dst: Reg,
        value: Reg,
        len: Option<Reg>,
    },
    HashCombine {
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    Phi {
        dst: Reg,
        incoming: Vec<(BlockId, Reg)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Reg,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Vec<Reg>),
    /// Abort execution with an arithmetic error
    Raise(ArithFault),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) name: String,
    pub(crate) instrs: Vec<Instr>,
    pub(crate) terminator: Option<Terminator>,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }
}

/// A finished function; the first block is the entry block
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) params: Vec<Reg>,
    pub(crate) reg_types: Vec<IrType>,
    pub(crate) constants: Vec<(Reg, Scalar)>,
    pub(crate) blocks: Vec<Block>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Reg] {
        &self.params
    }

    pub fn constants(&self) -> &[(Reg, Scalar)] {
        &self.constants
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn reg_type(&self, reg: Reg) -> IrType {
        self.reg_types[reg.index()]
    }

    /// `None` for a register this function never defined
    pub fn try_reg_type(&self, reg: Reg) -> Option<IrType> {
        self.reg_types.get(reg.index()).copied()
    }

    pub fn num_regs(&self) -> usize {
        self.reg_types.len()
    }

    /// Total number of instructions across all blocks
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Not { dst, src } => write!(f, "{} = not {}", dst, src),
            Instr::And { dst, lhs, rhs } => write!(f, "{} = and {}, {}", dst, lhs, rhs),
            Instr::Or { dst, lhs, rhs } => write!(f, "{} = or {}, {}", dst, lhs, rhs),
            Instr::Cmp {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(f, "{} = cmp {} {}, {}", dst, pred.as_str(), lhs, rhs),
            Instr::Arith { dst, op, lhs, rhs } => {
                write!(f, "{} = {} {}, {}", dst, op.as_str(), lhs, rhs)
            }
            Instr::CheckedArith {
                dst,
                overflow,
                op,
                lhs,
                rhs,
            } => write!(
                f,
                "{}, {} = {}.checked {}, {}",
                dst,
                overflow,
                op.as_str(),
                lhs,
                rhs
            ),
            Instr::Select {
                dst,
                cond,
                on_true,
                on_false,
            } => write!(f, "{} = select {}, {}, {}", dst, cond, on_true, on_false),
            Instr::Convert { dst, src, to } => write!(f, "{} = convert {} to {}", dst, src, to),
            Instr::CheckedConvert {
                dst,
                out_of_range,
                src,
                to,
            } => write!(
                f,
                "{}, {} = convert.checked {} to {}",
                dst, out_of_range, src, to
            ),
            Instr::ThreeWay { dst, lhs, rhs } => write!(f, "{} = cmp3 {}, {}", dst, lhs, rhs),
            Instr::StrCmp {
                dst,
                lhs,
                lhs_len,
                rhs,
                rhs_len,
            } => write!(
                f,
                "{} = strcmp {}[{}], {}[{}]",
                dst, lhs, lhs_len, rhs, rhs_len
            ),
            Instr::Format { dst, len, src } => write!(f, "{}, {} = format {}", dst, len, src),
            Instr::Hash { dst, value, len } => match len {
                Some(len) => write!(f, "{} = hash {}[{}]", dst, value, len),
                None => write!(f, "{} = hash {}", dst, value),
            },
            Instr::HashCombine { dst, lhs, rhs } => {
                write!(f, "{} = hash.combine {}, {}", dst, lhs, rhs)
            }
            Instr::Phi { dst, incoming } => {
                write!(f, "{} = phi", dst)?;
                for (i, (block, reg)) in incoming.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}[{}, {}]", sep, reg, block)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Br(target) => write!(f, "br {}", target),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {}, {}, {}", cond, then_block, else_block),
            Terminator::Ret(regs) => {
                f.write_str("ret")?;
                for (i, reg) in regs.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{}", sep, reg)?;
                }
                Ok(())
            }
            Terminator::Raise(fault) => write!(f, "raise \"{}\"", fault),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param, self.reg_type(*param))?;
        }
        writeln!(f, ") {{")?;
        for (reg, value) in &self.constants {
            writeln!(f, "  const {} = {}", reg, value)?;
        }
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "bb{} ({}):", i, block.name)?;
            for instr in &block.instrs {
                writeln!(f, "  {}", instr)?;
            }
            match &block.terminator {
                Some(term) => writeln!(f, "  {}", term)?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }
        write!(f, "}}")
    }
}
