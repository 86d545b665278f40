//! The code-emission context.
//!
//! A [`CodeGen`] owns the function under construction and an insertion
//! point. Emitters append to the current block and hand back the register
//! holding the result. One `CodeGen` is a single-writer resource; separate
//! compilations each own their own.

use crate::codegen::ir::{
    ArithOp, Block, BlockId, CmpPred, Function, Instr, IrType, Reg, Scalar, Terminator,
};
use crate::config::CodegenConfig;
use crate::error::{ArithFault, CodegenError, CodegenResult};
use crate::types::TypeRegistry;
use log::trace;
use std::sync::Arc;

pub struct CodeGen {
    registry: Arc<TypeRegistry>,
    config: CodegenConfig,
    function: Function,
    current: BlockId,
    /// First misuse of the builder, reported by `finish`
    error: Option<CodegenError>,
}

impl CodeGen {
    /// Start a new function with an empty entry block
    pub fn new(name: impl Into<String>, registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(name, registry, CodegenConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        registry: Arc<TypeRegistry>,
        config: CodegenConfig,
    ) -> Self {
        let mut cg = Self {
            registry,
            config,
            function: Function {
                name: name.into(),
                params: Vec::new(),
                reg_types: Vec::new(),
                constants: Vec::new(),
                blocks: Vec::new(),
            },
            current: BlockId(0),
            error: None,
        };
        cg.current = cg.create_block("entry");
        cg
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn add_param(&mut self, ty: IrType) -> Reg {
        let reg = self.new_reg(ty);
        self.function.params.push(reg);
        reg
    }

    pub fn reg_type(&self, reg: Reg) -> IrType {
        self.function.reg_type(reg)
    }

    pub fn try_reg_type(&self, reg: Reg) -> Option<IrType> {
        self.function.try_reg_type(reg)
    }

    //===--------------------------------------------------------------------===//
    // Blocks
    //===--------------------------------------------------------------------===//

    pub fn create_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.function.blocks.len() as u32);
        self.function.blocks.push(Block {
            name: name.into(),
            instrs: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.function.blocks[block.index()].terminator.is_some()
    }

    //===--------------------------------------------------------------------===//
    // Constants
    //===--------------------------------------------------------------------===//

    pub fn constant(&mut self, value: Scalar) -> Reg {
        let reg = self.new_reg(value.ir_type());
        self.function.constants.push((reg, value));
        reg
    }

    pub fn const_bool(&mut self, value: bool) -> Reg {
        self.constant(Scalar::Bool(value))
    }

    pub fn const_i16(&mut self, value: i16) -> Reg {
        self.constant(Scalar::I16(value))
    }

    pub fn const_i32(&mut self, value: i32) -> Reg {
        self.constant(Scalar::I32(value))
    }

    pub fn const_i64(&mut self, value: i64) -> Reg {
        self.constant(Scalar::I64(value))
    }

    pub fn const_f64(&mut self, value: f64) -> Reg {
        self.constant(Scalar::F64(value))
    }

    pub fn const_str(&mut self, value: impl Into<String>) -> Reg {
        self.constant(Scalar::Str(value.into()))
    }

    /// Constant one of the given integer or float type
    pub fn const_one(&mut self, ty: IrType) -> Reg {
        match ty {
            IrType::I16 => self.const_i16(1),
            IrType::I32 => self.const_i32(1),
            IrType::I64 => self.const_i64(1),
            IrType::F64 => self.const_f64(1.0),
            IrType::Bool => self.const_bool(true),
            IrType::Str => self.const_str("1"),
        }
    }

    pub fn const_zero(&mut self, ty: IrType) -> Reg {
        self.constant(Scalar::zero(ty))
    }

    //===--------------------------------------------------------------------===//
    // Instructions
    //===--------------------------------------------------------------------===//

    pub fn not(&mut self, src: Reg) -> Reg {
        let dst = self.new_reg(IrType::Bool);
        self.push(Instr::Not { dst, src });
        dst
    }

    pub fn and(&mut self, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(IrType::Bool);
        self.push(Instr::And { dst, lhs, rhs });
        dst
    }

    pub fn or(&mut self, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(IrType::Bool);
        self.push(Instr::Or { dst, lhs, rhs });
        dst
    }

    /// OR together any number of flags; `None` when there are none
    pub fn or_all(&mut self, flags: impl IntoIterator<Item = Reg>) -> Option<Reg> {
        flags
            .into_iter()
            .reduce(|acc, flag| self.or(acc, flag))
    }

    pub fn cmp(&mut self, pred: CmpPred, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(IrType::Bool);
        self.push(Instr::Cmp {
            dst,
            pred,
            lhs,
            rhs,
        });
        dst
    }

    pub fn arith(&mut self, op: ArithOp, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(self.reg_type(lhs));
        self.push(Instr::Arith { dst, op, lhs, rhs });
        dst
    }

    /// Returns (result, overflow flag)
    pub fn checked_arith(&mut self, op: ArithOp, lhs: Reg, rhs: Reg) -> (Reg, Reg) {
        let dst = self.new_reg(self.reg_type(lhs));
        let overflow = self.new_reg(IrType::Bool);
        self.push(Instr::CheckedArith {
            dst,
            overflow,
            op,
            lhs,
            rhs,
        });
        (dst, overflow)
    }

    pub fn select(&mut self, cond: Reg, on_true: Reg, on_false: Reg) -> Reg {
        let dst = self.new_reg(self.reg_type(on_true));
        self.push(Instr::Select {
            dst,
            cond,
            on_true,
            on_false,
        });
        dst
    }

    pub fn convert(&mut self, src: Reg, to: IrType) -> Reg {
        if self.reg_type(src) == to {
            return src;
        }
        let dst = self.new_reg(to);
        self.push(Instr::Convert { dst, src, to });
        dst
    }

    /// Returns (result, out-of-range flag)
    pub fn checked_convert(&mut self, src: Reg, to: IrType) -> (Reg, Reg) {
        let dst = self.new_reg(to);
        let out_of_range = self.new_reg(IrType::Bool);
        self.push(Instr::CheckedConvert {
            dst,
            out_of_range,
            src,
            to,
        });
        (dst, out_of_range)
    }

    pub fn three_way(&mut self, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(IrType::I32);
        self.push(Instr::ThreeWay { dst, lhs, rhs });
        dst
    }

    pub fn str_cmp(&mut self, lhs: Reg, lhs_len: Reg, rhs: Reg, rhs_len: Reg) -> Reg {
        let dst = self.new_reg(IrType::I32);
        self.push(Instr::StrCmp {
            dst,
            lhs,
            lhs_len,
            rhs,
            rhs_len,
        });
        dst
    }

    /// Returns (text, byte length)
    pub fn format(&mut self, src: Reg) -> (Reg, Reg) {
        let dst = self.new_reg(IrType::Str);
        let len = self.new_reg(IrType::I32);
        self.push(Instr::Format { dst, len, src });
        (dst, len)
    }

    pub fn hash(&mut self, value: Reg, len: Option<Reg>) -> Reg {
        let dst = self.new_reg(IrType::I64);
        self.push(Instr::Hash { dst, value, len });
        dst
    }

    pub fn hash_combine(&mut self, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.new_reg(IrType::I64);
        self.push(Instr::HashCombine { dst, lhs, rhs });
        dst
    }

    pub fn phi(&mut self, ty: IrType, incoming: Vec<(BlockId, Reg)>) -> Reg {
        let dst = self.new_reg(ty);
        self.push(Instr::Phi { dst, incoming });
        dst
    }

    //===--------------------------------------------------------------------===//
    // Control flow
    //===--------------------------------------------------------------------===//

    pub fn br(&mut self, target: BlockId) -> CodegenResult<()> {
        self.terminate(Terminator::Br(target))
    }

    pub fn cond_br(&mut self, cond: Reg, then_block: BlockId, else_block: BlockId) -> CodegenResult<()> {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        })
    }

    pub fn ret(&mut self, regs: Vec<Reg>) -> CodegenResult<()> {
        self.terminate(Terminator::Ret(regs))
    }

    pub fn raise(&mut self, fault: ArithFault) -> CodegenResult<()> {
        self.terminate(Terminator::Raise(fault))
    }

    /// Raise `fault` when `cond` holds; emission continues on the
    /// non-faulting path.
    pub fn trap_if(&mut self, cond: Reg, fault: ArithFault) -> CodegenResult<()> {
        trace!("emitting trap on {} for {}", cond, fault);
        let fault_block = self.create_block("fault");
        let cont_block = self.create_block("cont");
        self.cond_br(cond, fault_block, cont_block)?;
        self.position_at_end(fault_block);
        self.raise(fault)?;
        self.position_at_end(cont_block);
        Ok(())
    }

    /// Validate and hand out the finished function
    pub fn finish(self) -> CodegenResult<Function> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if let Some(block) = self.function.blocks.iter().find(|b| b.terminator.is_none()) {
            return Err(CodegenError::UnterminatedBlock(block.name.clone()));
        }
        Ok(self.function)
    }

    fn new_reg(&mut self, ty: IrType) -> Reg {
        let reg = Reg(self.function.reg_types.len() as u32);
        self.function.reg_types.push(ty);
        reg
    }

    fn push(&mut self, instr: Instr) {
        let block = &mut self.function.blocks[self.current.index()];
        if block.terminator.is_some() && self.error.is_none() {
            self.error = Some(CodegenError::BlockAlreadyTerminated(block.name.clone()));
        }
        block.instrs.push(instr);
    }

    fn terminate(&mut self, terminator: Terminator) -> CodegenResult<()> {
        let block = &mut self.function.blocks[self.current.index()];
        if block.terminator.is_some() {
            return Err(CodegenError::BlockAlreadyTerminated(block.name.clone()));
        }
        block.terminator = Some(terminator);
        Ok(())
    }
}
