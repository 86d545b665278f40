//! Executes emitted functions.
//!
//! The interpreter gives generated code the semantics native code would
//! have: wrapping machine arithmetic, explicit overflow flags, PHIs that
//! pick the value of the predecessor actually taken, and `raise`
//! terminators that abort with an arithmetic error.

use crate::codegen::ir::{ArithOp, BlockId, CmpPred, Function, Instr, IrType, Reg, Scalar, Terminator};
use crate::error::{RuntimeError, RuntimeResult};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

pub struct Interpreter<'a> {
    function: &'a Function,
}

impl<'a> Interpreter<'a> {
    pub fn new(function: &'a Function) -> Self {
        Self { function }
    }

    /// Run the function and return the registers named by its `ret`
    pub fn run(&self, args: &[Scalar]) -> RuntimeResult<Vec<Scalar>> {
        let params = self.function.params();
        if params.len() != args.len() {
            return Err(RuntimeError::ArgumentCount {
                expected: params.len(),
                actual: args.len(),
            });
        }

        let mut frame = Frame {
            regs: vec![None; self.function.num_regs()],
        };
        for (reg, value) in self.function.constants() {
            frame.set(*reg, value.clone());
        }
        for (reg, arg) in params.iter().zip(args) {
            let expected = self.function.reg_type(*reg);
            if arg.ir_type() != expected {
                return Err(RuntimeError::Trap(format!(
                    "argument {} has type {}, expected {}",
                    reg,
                    arg.ir_type(),
                    expected
                )));
            }
            frame.set(*reg, arg.clone());
        }

        let mut previous: Option<BlockId> = None;
        let mut current = BlockId(0);
        loop {
            let block = self.function.block(current);
            for instr in block.instrs() {
                frame.execute(instr, previous)?;
            }
            match block.terminator() {
                Some(Terminator::Br(target)) => {
                    previous = Some(current);
                    current = *target;
                }
                Some(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                }) => {
                    previous = Some(current);
                    current = if frame.bool(*cond)? {
                        *then_block
                    } else {
                        *else_block
                    };
                }
                Some(Terminator::Ret(regs)) => {
                    return regs.iter().map(|r| frame.get(*r).cloned()).collect();
                }
                Some(Terminator::Raise(fault)) => return Err(RuntimeError::Arithmetic(*fault)),
                None => {
                    return Err(RuntimeError::Trap(format!(
                        "fell off the end of block {}",
                        block.name()
                    )));
                }
            }
        }
    }
}

struct Frame {
    regs: Vec<Option<Scalar>>,
}

impl Frame {
    fn set(&mut self, reg: Reg, value: Scalar) {
        self.regs[reg.index()] = Some(value);
    }

    fn get(&self, reg: Reg) -> RuntimeResult<&Scalar> {
        self.regs
            .get(reg.index())
            .and_then(|r| r.as_ref())
            .ok_or_else(|| RuntimeError::Trap(format!("read of undefined register {}", reg)))
    }

    fn bool(&self, reg: Reg) -> RuntimeResult<bool> {
        let value = self.get(reg)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch("boolean operand", value))
    }

    fn execute(&mut self, instr: &Instr, previous: Option<BlockId>) -> RuntimeResult<()> {
        match instr {
            Instr::Not { dst, src } => {
                let v = self.bool(*src)?;
                self.set(*dst, Scalar::Bool(!v));
            }
            Instr::And { dst, lhs, rhs } => {
                let v = self.bool(*lhs)? && self.bool(*rhs)?;
                self.set(*dst, Scalar::Bool(v));
            }
            Instr::Or { dst, lhs, rhs } => {
                let v = self.bool(*lhs)? || self.bool(*rhs)?;
                self.set(*dst, Scalar::Bool(v));
            }
            Instr::Cmp {
                dst,
                pred,
                lhs,
                rhs,
            } => {
                let ord = partial_compare(self.get(*lhs)?, self.get(*rhs)?)?;
                self.set(*dst, Scalar::Bool(apply_pred(*pred, ord)));
            }
            Instr::Arith { dst, op, lhs, rhs } => {
                let (value, _) = arith(*op, self.get(*lhs)?, self.get(*rhs)?)?;
                self.set(*dst, value);
            }
            Instr::CheckedArith {
                dst,
                overflow,
                op,
                lhs,
                rhs,
            } => {
                let (value, overflowed) = arith(*op, self.get(*lhs)?, self.get(*rhs)?)?;
                self.set(*dst, value);
                self.set(*overflow, Scalar::Bool(overflowed));
            }
            Instr::Select {
                dst,
                cond,
                on_true,
                on_false,
            } => {
                let pick = if self.bool(*cond)? { on_true } else { on_false };
                let value = self.get(*pick)?.clone();
                self.set(*dst, value);
            }
            Instr::Convert { dst, src, to } => {
                let (value, _) = convert(self.get(*src)?, *to)?;
                self.set(*dst, value);
            }
            Instr::CheckedConvert {
                dst,
                out_of_range,
                src,
                to,
            } => {
                let (value, outside) = convert(self.get(*src)?, *to)?;
                self.set(*dst, value);
                self.set(*out_of_range, Scalar::Bool(outside));
            }
            Instr::ThreeWay { dst, lhs, rhs } => {
                let ord = total_compare(self.get(*lhs)?, self.get(*rhs)?)?;
                self.set(*dst, Scalar::I32(ordering_to_i32(ord)));
            }
            Instr::StrCmp {
                dst,
                lhs,
                lhs_len,
                rhs,
                rhs_len,
            } => {
                let l = bounded_bytes(self.get(*lhs)?, self.get(*lhs_len)?)?;
                let r = bounded_bytes(self.get(*rhs)?, self.get(*rhs_len)?)?;
                self.set(*dst, Scalar::I32(ordering_to_i32(l.cmp(r))));
            }
            Instr::Format { dst, len, src } => {
                let text = match self.get(*src)? {
                    Scalar::Bool(v) => v.to_string(),
                    Scalar::I16(v) => v.to_string(),
                    Scalar::I32(v) => v.to_string(),
                    Scalar::I64(v) => v.to_string(),
                    Scalar::F64(v) => v.to_string(),
                    Scalar::Str(v) => v.clone(),
                };
                let text_len = i32::try_from(text.len())
                    .map_err(|_| RuntimeError::Trap("formatted text too long".to_string()))?;
                self.set(*dst, Scalar::Str(text));
                self.set(*len, Scalar::I32(text_len));
            }
            Instr::Hash { dst, value, len } => {
                let mut hasher = DefaultHasher::new();
                match (self.get(*value)?, len) {
                    (Scalar::Str(_), Some(len)) => {
                        hasher.write(bounded_bytes(self.get(*value)?, self.get(*len)?)?)
                    }
                    (Scalar::Str(s), None) => hasher.write(s.as_bytes()),
                    (Scalar::Bool(v), _) => hasher.write_u8(u8::from(*v)),
                    (Scalar::F64(v), _) => {
                        // Keys that sort equal hash alike: one zero, one NaN
                        let v = if *v == 0.0 {
                            0.0
                        } else if v.is_nan() {
                            f64::NAN
                        } else {
                            *v
                        };
                        hasher.write_u64(v.to_bits())
                    }
                    (other, _) => match other.as_i64() {
                        Some(v) => hasher.write_i64(v),
                        None => return Err(mismatch("hashable operand", other)),
                    },
                }
                self.set(*dst, Scalar::I64(hasher.finish() as i64));
            }
            Instr::HashCombine { dst, lhs, rhs } => {
                let l = self.i64(*lhs)? as u64;
                let r = self.i64(*rhs)? as u64;
                let combined = l
                    ^ r.wrapping_add(0x9e37_79b9_7f4a_7c15)
                        .wrapping_add(l << 6)
                        .wrapping_add(l >> 2);
                self.set(*dst, Scalar::I64(combined as i64));
            }
            Instr::Phi { dst, incoming } => {
                let from = previous.ok_or_else(|| {
                    RuntimeError::Trap("phi reached without a predecessor".to_string())
                })?;
                let (_, reg) = incoming
                    .iter()
                    .find(|(block, _)| *block == from)
                    .ok_or_else(|| {
                        RuntimeError::Trap(format!("phi {} has no input from {}", dst, from))
                    })?;
                let value = self.get(*reg)?.clone();
                self.set(*dst, value);
            }
        }
        Ok(())
    }

    fn i64(&self, reg: Reg) -> RuntimeResult<i64> {
        match self.get(reg)? {
            Scalar::I64(v) => Ok(*v),
            other => Err(mismatch("i64 operand", other)),
        }
    }
}

fn mismatch(expected: &str, actual: &Scalar) -> RuntimeError {
    RuntimeError::Trap(format!("expected {}, got {}", expected, actual))
}

fn ordering_to_i32(ord: Ordering) -> i32 {
    match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn apply_pred(pred: CmpPred, ord: Option<Ordering>) -> bool {
    match (pred, ord) {
        (CmpPred::Ne, None) => true,
        (_, None) => false,
        (CmpPred::Eq, Some(o)) => o == Ordering::Equal,
        (CmpPred::Ne, Some(o)) => o != Ordering::Equal,
        (CmpPred::Lt, Some(o)) => o == Ordering::Less,
        (CmpPred::Le, Some(o)) => o != Ordering::Greater,
        (CmpPred::Gt, Some(o)) => o == Ordering::Greater,
        (CmpPred::Ge, Some(o)) => o != Ordering::Less,
    }
}

fn partial_compare(lhs: &Scalar, rhs: &Scalar) -> RuntimeResult<Option<Ordering>> {
    match (lhs, rhs) {
        (Scalar::F64(l), Scalar::F64(r)) => Ok(l.partial_cmp(r)),
        _ => total_compare(lhs, rhs).map(Some),
    }
}

fn total_compare(lhs: &Scalar, rhs: &Scalar) -> RuntimeResult<Ordering> {
    match (lhs, rhs) {
        (Scalar::Bool(l), Scalar::Bool(r)) => Ok(l.cmp(r)),
        (Scalar::I16(l), Scalar::I16(r)) => Ok(l.cmp(r)),
        (Scalar::I32(l), Scalar::I32(r)) => Ok(l.cmp(r)),
        (Scalar::I64(l), Scalar::I64(r)) => Ok(l.cmp(r)),
        (Scalar::F64(l), Scalar::F64(r)) => Ok(l.total_cmp(r)),
        (Scalar::Str(l), Scalar::Str(r)) => Ok(l.as_bytes().cmp(r.as_bytes())),
        _ => Err(RuntimeError::Trap(format!(
            "cannot compare {} with {}",
            lhs, rhs
        ))),
    }
}

fn bounded_bytes<'s>(value: &'s Scalar, len: &Scalar) -> RuntimeResult<&'s [u8]> {
    let Scalar::Str(s) = value else {
        return Err(mismatch("string operand", value));
    };
    let len = len
        .as_i64()
        .ok_or_else(|| mismatch("length operand", len))?;
    let len = usize::try_from(len).unwrap_or(0).min(s.len());
    Ok(&s.as_bytes()[..len])
}

macro_rules! int_arith {
    ($op:expr, $l:expr, $r:expr, $variant:path) => {{
        let (l, r) = ($l, $r);
        match $op {
            ArithOp::Add => {
                let (v, o) = l.overflowing_add(r);
                ($variant(v), o)
            }
            ArithOp::Sub => {
                let (v, o) = l.overflowing_sub(r);
                ($variant(v), o)
            }
            ArithOp::Mul => {
                let (v, o) = l.overflowing_mul(r);
                ($variant(v), o)
            }
            ArithOp::Div => {
                if r == 0 {
                    return Err(RuntimeError::Trap("unguarded integer division by zero".to_string()));
                }
                let (v, o) = l.overflowing_div(r);
                ($variant(v), o)
            }
            ArithOp::Rem => {
                if r == 0 {
                    return Err(RuntimeError::Trap("unguarded integer remainder by zero".to_string()));
                }
                // MIN % -1 is 0, not an overflow
                ($variant(l.wrapping_rem(r)), false)
            }
        }
    }};
}

/// Returns the wrapped result and whether it overflowed
fn arith(op: ArithOp, lhs: &Scalar, rhs: &Scalar) -> RuntimeResult<(Scalar, bool)> {
    let result = match (lhs, rhs) {
        (Scalar::I16(l), Scalar::I16(r)) => int_arith!(op, *l, *r, Scalar::I16),
        (Scalar::I32(l), Scalar::I32(r)) => int_arith!(op, *l, *r, Scalar::I32),
        (Scalar::I64(l), Scalar::I64(r)) => int_arith!(op, *l, *r, Scalar::I64),
        (Scalar::F64(l), Scalar::F64(r)) => {
            let v = match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => l / r,
                ArithOp::Rem => l % r,
            };
            (Scalar::F64(v), false)
        }
        _ => {
            return Err(RuntimeError::Trap(format!(
                "cannot {} {} and {}",
                op.as_str(),
                lhs,
                rhs
            )))
        }
    };
    Ok(result)
}

/// Returns the converted value and whether the source was out of range
fn convert(src: &Scalar, to: IrType) -> RuntimeResult<(Scalar, bool)> {
    if let Some(v) = src.as_i64() {
        return Ok(match to {
            IrType::Bool => (Scalar::Bool(v != 0), false),
            IrType::I16 => (Scalar::I16(v as i16), i16::try_from(v).is_err()),
            IrType::I32 => (Scalar::I32(v as i32), i32::try_from(v).is_err()),
            IrType::I64 => (Scalar::I64(v), false),
            IrType::F64 => (Scalar::F64(v as f64), false),
            IrType::Str => return Err(RuntimeError::Trap(format!("cannot convert {} to str", src))),
        });
    }
    match (src, to) {
        (Scalar::Bool(v), IrType::Bool) => Ok((Scalar::Bool(*v), false)),
        (Scalar::Bool(v), _) if to.is_integer() || to == IrType::F64 => {
            convert(&Scalar::I64(i64::from(*v)), to)
        }
        (Scalar::F64(v), IrType::F64) => Ok((Scalar::F64(*v), false)),
        (Scalar::F64(v), IrType::Bool) => Ok((Scalar::Bool(*v != 0.0), false)),
        (Scalar::F64(v), _) if to.is_integer() => {
            let truncated = v.trunc();
            let (min, max) = match to {
                IrType::I16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
                IrType::I32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
                _ => (i64::MIN as f64, i64::MAX as f64),
            };
            // i64::MAX as f64 rounds up to 2^63, which is itself out of range
            let outside = !truncated.is_finite()
                || truncated < min
                || truncated > max
                || (to == IrType::I64 && truncated >= max);
            let (value, _) = convert(&Scalar::I64(truncated as i64), to)?;
            Ok((value, outside))
        }
        (Scalar::Str(s), IrType::Str) => Ok((Scalar::Str(s.clone()), false)),
        _ => Err(RuntimeError::Trap(format!("cannot convert {} to {}", src, to))),
    }
}
