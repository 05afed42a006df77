//! Rebuilding the instructions of a method from the byte code bands.
//!
//! This happens in three steps. Assigning reads the opcodes and their operands, giving instructions
//! that still refer to other instructions by their index. Laying out computes the byte offset of each
//! instruction, which depends on the lengths of all instructions before it. Fixing up then turns the
//! instruction indices of branches and switches into offsets relative to the branching instruction.

pub mod insn;
mod bands;

pub(crate) use bands::{CodeOperands, OperandBands};

use anyhow::{bail, Result};
use crate::cp::CpRef;
use crate::DecodeError;

/// The largest code length a method can have.
const MAX_CODE_LENGTH: u32 = 0xffff;

/// An instruction with its operands resolved.
///
/// Branch and switch offsets are relative to the offset of the instruction itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
	/// An instruction without operands.
	Simple(u8),
	/// `bipush` and `newarray`, with a single byte.
	Byte { opcode: u8, value: u8 },
	/// `sipush`.
	Short(i16),
	/// A load or store, or `ret`. If `wide`, it's prefixed with `wide` and the index uses two bytes.
	Local { opcode: u8, index: u16, wide: bool },
	Iinc { index: u16, increment: i16, wide: bool },
	/// `ldc`, `ldc_w` or `ldc2_w`.
	Constant { opcode: u8, entry: CpRef },
	Field { opcode: u8, field: CpRef },
	/// `invokevirtual`, `invokespecial` or `invokestatic`.
	Method { opcode: u8, method: CpRef },
	InterfaceMethod { method: CpRef, count: u8 },
	/// `new`, `anewarray`, `checkcast` and `instanceof`.
	Class { opcode: u8, class: CpRef },
	MultiANewArray { class: CpRef, dimensions: u8 },
	Branch { opcode: u8, delta: i32 },
	TableSwitch { default: i32, low: i32, deltas: Vec<i32> },
	LookupSwitch { default: i32, pairs: Vec<(i32, i32)> },
	/// A constant pool index in `size` bytes, standing for itself in the code.
	RefEscape { size: u8, entry: CpRef },
	/// Bytes standing for themselves in the code.
	ByteEscape(Vec<u8>),
}

impl Op {
	/// The number of bytes of this instruction when placed at `offset`.
	pub fn len(&self, offset: u32) -> u32 {
		match self {
			Op::Simple(_) => 1,
			Op::Byte { .. } => 2,
			Op::Short(_) => 3,
			Op::Local { wide: false, .. } => 2,
			Op::Local { wide: true, .. } => 4,
			Op::Iinc { wide: false, .. } => 3,
			Op::Iinc { wide: true, .. } => 6,
			Op::Constant { opcode, .. } => if *opcode == insn::ldc { 2 } else { 3 },
			Op::Field { .. } | Op::Method { .. } | Op::Class { .. } => 3,
			Op::InterfaceMethod { .. } => 5,
			Op::MultiANewArray { .. } => 4,
			Op::Branch { opcode, .. } => branch_len(*opcode),
			Op::TableSwitch { deltas, .. } => 1 + switch_padding(offset) + 12 + 4 * deltas.len() as u32,
			Op::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len() as u32,
			Op::RefEscape { size, .. } => *size as u32,
			Op::ByteEscape(bytes) => bytes.len() as u32,
		}
	}

	/// The constant pool entry this instruction refers to, if any.
	pub fn entry(&self) -> Option<CpRef> {
		match self {
			Op::Constant { entry, .. } => Some(*entry),
			Op::Field { field, .. } => Some(*field),
			Op::Method { method, .. } | Op::InterfaceMethod { method, .. } => Some(*method),
			Op::Class { class, .. } | Op::MultiANewArray { class, .. } => Some(*class),
			Op::RefEscape { entry, .. } => Some(*entry),
			_ => None,
		}
	}

	/// Whether the entry of this instruction is stored in a single byte, so that it needs one of the
	/// first 256 indices of the class file constant pool.
	pub fn needs_narrow_index(&self) -> bool {
		matches!(self, Op::Constant { opcode: insn::ldc, .. } | Op::RefEscape { size: 1, .. })
	}
}

fn branch_len(opcode: u8) -> u32 {
	if opcode == insn::goto_w || opcode == insn::jsr_w { 5 } else { 3 }
}

/// The number of bytes needed after the opcode at `offset` to align the operands of a switch to four bytes.
fn switch_padding(offset: u32) -> u32 {
	3 - offset % 4
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
	/// The offset of the first byte of the instruction in the code.
	pub offset: u32,
	pub op: Op,
}

/// An instruction whose branch targets are still instruction indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingOp {
	Done(Op),
	Branch { opcode: u8, target: i64 },
	TableSwitch { default: i64, low: i32, targets: Vec<i64> },
	LookupSwitch { default: i64, pairs: Vec<(i32, i64)> },
}

impl PendingOp {
	fn len(&self, offset: u32) -> u32 {
		match self {
			PendingOp::Done(op) => op.len(offset),
			PendingOp::Branch { opcode, .. } => branch_len(*opcode),
			PendingOp::TableSwitch { targets, .. } => 1 + switch_padding(offset) + 12 + 4 * targets.len() as u32,
			PendingOp::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len() as u32,
		}
	}
}

/// The offsets of the instructions of a method, indexed by the instruction index.
///
/// There's one more offset than there are instructions, the length of the code. Attributes may refer
/// to it, for example as the end of a local variable range.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BciTable(Vec<u32>);

impl BciTable {
	/// The number of instructions.
	pub(crate) fn count(&self) -> usize {
		self.0.len() - 1
	}

	pub(crate) fn code_length(&self) -> u32 {
		self.0[self.0.len() - 1]
	}

	/// Gets the offset of the instruction with the given index, or the code length for the index one past
	/// the last instruction.
	pub(crate) fn offset(&self, index: i64) -> Result<u32> {
		match usize::try_from(index).ok().and_then(|i| self.0.get(i)) {
			Some(&offset) => Ok(offset),
			None => bail!(DecodeError::UnresolvedReference {
				index,
				expected: "byte code index".to_owned(),
				message: format!("the code only has {} instructions", self.count()),
			}),
		}
	}
}

/// Computes the offsets of the instructions.
pub(crate) fn lay_out(ops: &[PendingOp]) -> Result<BciTable> {
	let mut offsets = Vec::with_capacity(ops.len() + 1);
	let mut offset = 0u32;
	offsets.push(offset);
	for op in ops {
		offset += op.len(offset);
		if offset > MAX_CODE_LENGTH {
			bail!(DecodeError::format(format!("code is longer than {MAX_CODE_LENGTH} bytes")));
		}
		offsets.push(offset);
	}
	Ok(BciTable(offsets))
}

/// Replaces the instruction indices of branches and switches by offsets relative to the instruction.
pub(crate) fn fix_up(ops: Vec<PendingOp>, table: &BciTable) -> Result<Vec<Instruction>> {
	let count = table.count();
	let delta = |index: usize, target: i64, narrow: bool| -> Result<i32> {
		let Some(target_offset) = usize::try_from(target).ok().filter(|&t| t < count).map(|t| table.0[t]) else {
			bail!(DecodeError::BranchFixup {
				instruction: index,
				target,
				message: format!("the method only has {count} instructions"),
			});
		};
		let delta = target_offset as i32 - table.0[index] as i32;
		if narrow && i16::try_from(delta).is_err() {
			bail!(DecodeError::BranchFixup {
				instruction: index,
				target,
				message: format!("offset {delta} doesn't fit into two bytes"),
			});
		}
		Ok(delta)
	};

	ops.into_iter()
		.enumerate()
		.map(|(index, op)| {
			let op = match op {
				PendingOp::Done(op) => op,
				PendingOp::Branch { opcode, target } => Op::Branch {
					opcode,
					delta: delta(index, target, branch_len(opcode) == 3)?,
				},
				PendingOp::TableSwitch { default, low, targets } => Op::TableSwitch {
					default: delta(index, default, false)?,
					low,
					deltas: targets.into_iter()
						.map(|target| delta(index, target, false))
						.collect::<Result<_>>()?,
				},
				PendingOp::LookupSwitch { default, pairs } => Op::LookupSwitch {
					default: delta(index, default, false)?,
					pairs: pairs.into_iter()
						.map(|(key, target)| Ok((key, delta(index, target, false)?)))
						.collect::<Result<_>>()?,
				},
			};
			Ok(Instruction { offset: table.0[index], op })
		})
		.collect()
}
