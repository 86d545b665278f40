//! Hashing of value lists, e.g. for hash join and aggregation keys.

use crate::codegen::ir::Reg;
use crate::codegen::{CodeGen, TypedValue};
use crate::error::CodegenResult;

/// Starting state of every combined hash
const SEED: i64 = 0x2545_f491_4f6c_dd1d;

/// Hash of a NULL column, whatever its type
const NULL_HASH: i64 = 0x5bd1_e995;

pub struct Hash;

impl Hash {
    /// Emit an I64 register holding the combined hash of `values`. Equal
    /// lists hash equal; all NULLs hash alike regardless of the garbage
    /// their value registers hold.
    pub fn hash_values(cg: &mut CodeGen, values: &[TypedValue]) -> CodegenResult<Reg> {
        let mut hash = cg.const_i64(SEED);
        for value in values {
            let (reg, length) = value.values_for_hash()?;
            let mut column = cg.hash(reg, length);
            if value.is_nullable() {
                let null = value.is_null(cg);
                let sentinel = cg.const_i64(NULL_HASH);
                column = cg.select(null, sentinel, column);
            }
            hash = cg.hash_combine(hash, column);
        }
        Ok(hash)
    }
}
