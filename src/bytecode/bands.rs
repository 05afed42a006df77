//! The `bc_codes` band and the operand bands.
//!
//! The opcodes of all methods come first, each method ended by [`insn::end_marker`]. The operands of
//! all instructions follow, split into bands by the kind of operand. Which operands a method uses, and
//! so where in each band they start, is only known after walking the opcodes of all methods before it.

use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use pack_coding::{Bhsd, BRANCH5, BYTE1, DELTA5, UNSIGNED5};
use crate::bytecode::{insn, Op, PendingOp};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::descriptor::argument_slots;
use crate::DecodeError;
use crate::stream::{to_length, BandReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandBand {
	CaseCount,
	CaseValue,
	Byte,
	Short,
	Local,
	Label,
	IntRef,
	FloatRef,
	LongRef,
	DoubleRef,
	StringRef,
	ClassRef,
	FieldRef,
	MethodRef,
	IMethodRef,
	ThisField,
	SuperField,
	ThisMethod,
	SuperMethod,
	InitRef,
	EscRef,
	EscRefSize,
	EscSize,
	EscByte,
}

const BAND_COUNT: usize = 24;

/// The operand bands, in the order they're stored in.
const OPERAND_BANDS: [OperandBand; BAND_COUNT] = {
	use OperandBand::*;
	[
		CaseCount, CaseValue, Byte, Short, Local, Label,
		IntRef, FloatRef, LongRef, DoubleRef, StringRef, ClassRef,
		FieldRef, MethodRef, IMethodRef,
		ThisField, SuperField, ThisMethod, SuperMethod, InitRef,
		EscRef, EscRefSize, EscSize, EscByte,
	]
};

impl OperandBand {
	fn name(self) -> &'static str {
		use OperandBand::*;
		match self {
			CaseCount => "bc_case_count",
			CaseValue => "bc_case_value",
			Byte => "bc_byte",
			Short => "bc_short",
			Local => "bc_local",
			Label => "bc_label",
			IntRef => "bc_intref",
			FloatRef => "bc_floatref",
			LongRef => "bc_longref",
			DoubleRef => "bc_doubleref",
			StringRef => "bc_stringref",
			ClassRef => "bc_classref",
			FieldRef => "bc_fieldref",
			MethodRef => "bc_methodref",
			IMethodRef => "bc_imethodref",
			ThisField => "bc_thisfield",
			SuperField => "bc_superfield",
			ThisMethod => "bc_thismethod",
			SuperMethod => "bc_supermethod",
			InitRef => "bc_initref",
			EscRef => "bc_escref",
			EscRefSize => "bc_escrefsize",
			EscSize => "bc_escsize",
			EscByte => "bc_escbyte",
		}
	}

	fn coding(self) -> Bhsd {
		use OperandBand::*;
		match self {
			CaseValue | Short | IntRef | FloatRef | LongRef | DoubleRef | StringRef | FieldRef | IMethodRef => DELTA5,
			Byte | EscByte => BYTE1,
			Label => BRANCH5,
			_ => UNSIGNED5,
		}
	}

	fn slot(self) -> usize {
		self as usize
	}
}

/// Which constructors an `invokeinit` opcode refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitOf {
	This,
	Super,
	/// The class of the last `new` before it.
	New,
}

/// How the operands of an opcode are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
	Simple,
	/// `bipush` and `newarray`.
	Byte,
	Short,
	Local,
	Iinc,
	/// The loads of constants, with the opcode they stand for.
	Constant { opcode: u8, band: OperandBand, kind: CpKind },
	Field,
	Method,
	InterfaceMethod,
	Class,
	MultiANewArray,
	/// A field or method access on this class or the super class, with the opcode it stands for.
	SelfLinker { opcode: u8, aload_0: bool, band: OperandBand },
	Init(InitOf),
	Branch,
	TableSwitch,
	LookupSwitch,
	RefEscape,
	ByteEscape,
	Wide,
}

impl Shape {
	fn of(opcode: u8) -> Result<Shape> {
		use OperandBand::*;
		Ok(match opcode {
			insn::bipush | insn::newarray => Shape::Byte,
			insn::sipush => Shape::Short,
			insn::iload..=insn::aload | insn::istore..=insn::astore | insn::ret => Shape::Local,
			insn::iinc => Shape::Iinc,
			insn::ldc | insn::ldc_w => Shape::Constant { opcode, band: StringRef, kind: CpKind::String },
			insn::ldc2_w => Shape::Constant { opcode, band: LongRef, kind: CpKind::Long },
			insn::cldc => Shape::Constant { opcode: insn::ldc, band: ClassRef, kind: CpKind::Class },
			insn::ildc => Shape::Constant { opcode: insn::ldc, band: IntRef, kind: CpKind::Int },
			insn::fldc => Shape::Constant { opcode: insn::ldc, band: FloatRef, kind: CpKind::Float },
			insn::cldc_w => Shape::Constant { opcode: insn::ldc_w, band: ClassRef, kind: CpKind::Class },
			insn::ildc_w => Shape::Constant { opcode: insn::ldc_w, band: IntRef, kind: CpKind::Int },
			insn::fldc_w => Shape::Constant { opcode: insn::ldc_w, band: FloatRef, kind: CpKind::Float },
			insn::dldc2_w => Shape::Constant { opcode: insn::ldc2_w, band: DoubleRef, kind: CpKind::Double },
			insn::getstatic..=insn::putfield => Shape::Field,
			insn::invokevirtual..=insn::invokestatic => Shape::Method,
			insn::invokeinterface => Shape::InterfaceMethod,
			insn::new | insn::anewarray | insn::checkcast | insn::instanceof => Shape::Class,
			insn::multianewarray => Shape::MultiANewArray,
			opcode if (insn::self_linker_op..insn::self_linker_limit).contains(&opcode) => {
				let index = opcode - insn::self_linker_op;
				let which = index % 7;
				let is_super = (index / 7) & 2 != 0;
				let band = match (which < 4, is_super) {
					(true, false) => ThisField,
					(true, true) => SuperField,
					(false, false) => ThisMethod,
					(false, true) => SuperMethod,
				};
				Shape::SelfLinker { opcode: insn::getstatic + which, aload_0: (index / 7) & 1 != 0, band }
			},
			insn::invokeinit_self => Shape::Init(InitOf::This),
			insn::invokeinit_super => Shape::Init(InitOf::Super),
			insn::invokeinit_new => Shape::Init(InitOf::New),
			insn::ifeq..=insn::jsr | insn::ifnull | insn::ifnonnull | insn::goto_w | insn::jsr_w => Shape::Branch,
			insn::tableswitch => Shape::TableSwitch,
			insn::lookupswitch => Shape::LookupSwitch,
			insn::ref_escape => Shape::RefEscape,
			insn::byte_escape => Shape::ByteEscape,
			insn::wide => Shape::Wide,
			insn::invokedynamic => bail!(DecodeError::format("invokedynamic isn't supported")),
			0..=insn::jsr_w => Shape::Simple,
			_ => bail!(DecodeError::format(format!("unknown packed opcode {opcode}"))),
		})
	}

	/// The bands with exactly one value for each instruction of this shape.
	fn bands(self) -> &'static [OperandBand] {
		use OperandBand::*;
		match self {
			Shape::Simple | Shape::Wide => &[],
			Shape::Byte => &[Byte],
			Shape::Short => &[Short],
			Shape::Local => &[Local],
			Shape::Iinc => &[Local, Byte],
			Shape::Constant { band: IntRef, .. } => &[IntRef],
			Shape::Constant { band: FloatRef, .. } => &[FloatRef],
			Shape::Constant { band: LongRef, .. } => &[LongRef],
			Shape::Constant { band: DoubleRef, .. } => &[DoubleRef],
			Shape::Constant { band: ClassRef, .. } => &[ClassRef],
			Shape::Constant { .. } => &[StringRef],
			Shape::Field => &[FieldRef],
			Shape::Method => &[MethodRef],
			Shape::InterfaceMethod => &[IMethodRef],
			Shape::Class => &[ClassRef],
			Shape::MultiANewArray => &[ClassRef, Byte],
			Shape::SelfLinker { band: ThisField, .. } => &[ThisField],
			Shape::SelfLinker { band: SuperField, .. } => &[SuperField],
			Shape::SelfLinker { band: ThisMethod, .. } => &[ThisMethod],
			Shape::SelfLinker { .. } => &[SuperMethod],
			Shape::Init(_) => &[InitRef],
			Shape::Branch => &[Label],
			// the case values and labels depend on the case count
			Shape::TableSwitch | Shape::LookupSwitch => &[CaseCount],
			Shape::RefEscape => &[EscRefSize, EscRef],
			// the bytes depend on the size
			Shape::ByteEscape => &[EscSize],
		}
	}
}

/// The operands one method uses.
#[derive(Debug, Clone, Default)]
struct Usage {
	counts: [usize; BAND_COUNT],
	/// Whether each switch is a `tableswitch`, in order.
	switches: Vec<bool>,
}

impl Usage {
	fn of(codes: &[u8]) -> Result<Usage> {
		let mut usage = Usage::default();
		let mut codes = codes.iter();
		while let Some(&opcode) = codes.next() {
			let shape = match Shape::of(opcode)? {
				Shape::Wide => {
					let Some(&next) = codes.next() else {
						bail!(DecodeError::format("wide at the end of the byte codes"));
					};
					match Shape::of(next)? {
						Shape::Local => Shape::Local,
						// a wide iinc has a short increment
						Shape::Iinc => {
							usage.counts[OperandBand::Local.slot()] += 1;
							usage.counts[OperandBand::Short.slot()] += 1;
							continue;
						},
						_ => bail!(DecodeError::format(format!("opcode {next} can't be wide"))),
					}
				},
				shape => shape,
			};
			for band in shape.bands() {
				usage.counts[band.slot()] += 1;
			}
			match shape {
				Shape::TableSwitch => usage.switches.push(true),
				Shape::LookupSwitch => usage.switches.push(false),
				_ => {},
			}
		}
		Ok(usage)
	}
}

/// The contents of the `bc_codes` band and of all operand bands.
#[derive(Debug, Clone, Default)]
pub(crate) struct OperandBands {
	codes: Vec<Vec<u8>>,
	/// For each method, the index in each band of its first value.
	starts: Vec<[usize; BAND_COUNT]>,
	values: Vec<Vec<i64>>,
}

impl OperandBands {
	/// Reads the byte codes of `count` methods and their operands.
	pub(crate) fn read(reader: &mut BandReader, count: usize) -> Result<OperandBands> {
		let mut codes = Vec::with_capacity(count);
		for method in 0..count {
			let bytes = reader.bytes_until("bc_codes", insn::end_marker)
				.with_context(|| anyhow!("byte codes of method {method}"))?;
			codes.push(bytes.to_vec());
		}

		let mut usages: Vec<Usage> = codes.iter()
			.enumerate()
			.map(|(method, codes)| Usage::of(codes).with_context(|| anyhow!("byte codes of method {method}")))
			.collect::<Result<_>>()?;

		let mut values: Vec<Vec<i64>> = Vec::with_capacity(BAND_COUNT);
		for band in OPERAND_BANDS {
			let total: usize = usages.iter().map(|usage| usage.counts[band.slot()]).sum();
			let band_values = reader.band(band.name(), band.coding(), total)?;

			match band {
				OperandBand::CaseCount => {
					let mut case_counts = band_values.iter();
					for usage in &mut usages {
						for &is_table in &usage.switches {
							let n = case_counts.next()
								.with_context(|| anyhow!("bc_case_count ran out of values"))?;
							let n = to_length(band.name(), *n)?;
							usage.counts[OperandBand::CaseValue.slot()] += if is_table { 1 } else { n };
							usage.counts[OperandBand::Label.slot()] += n + 1;
						}
					}
				},
				OperandBand::EscSize => {
					let mut sizes = band_values.iter();
					for usage in &mut usages {
						for _ in 0..usage.counts[OperandBand::EscSize.slot()] {
							let size = sizes.next()
								.with_context(|| anyhow!("bc_escsize ran out of values"))?;
							usage.counts[OperandBand::EscByte.slot()] += to_length(band.name(), *size)?;
						}
					}
				},
				_ => {},
			}
			values.push(band_values);
		}

		let mut starts = Vec::with_capacity(count);
		let mut next = [0; BAND_COUNT];
		for usage in &usages {
			starts.push(next);
			for (start, count) in next.iter_mut().zip(usage.counts) {
				*start += count;
			}
		}
		trace!("read byte codes of {count} methods");

		Ok(OperandBands { codes, starts, values })
	}

	/// Gets the byte codes and operands of the method with code number `index`.
	pub(crate) fn code(&self, index: usize) -> Result<CodeOperands<'_>> {
		let codes = self.codes.get(index)
			.with_context(|| anyhow!("there are only byte codes for {} methods, not for method {index}", self.codes.len()))?;
		Ok(CodeOperands { bands: self, codes, cursors: self.starts[index] })
	}
}

/// The byte codes of one method, with a cursor into each operand band.
#[derive(Debug, Clone)]
pub(crate) struct CodeOperands<'a> {
	bands: &'a OperandBands,
	codes: &'a [u8],
	cursors: [usize; BAND_COUNT],
}

impl CodeOperands<'_> {
	fn next(&mut self, band: OperandBand) -> Result<i64> {
		let cursor = &mut self.cursors[band.slot()];
		let Some(&value) = self.bands.values[band.slot()].get(*cursor) else {
			bail!(DecodeError::band_length(band.name(), format!("needed value number {}", *cursor + 1)));
		};
		*cursor += 1;
		Ok(value)
	}

	fn next_u8(&mut self, band: OperandBand) -> Result<u8> {
		let value = self.next(band)?;
		u8::try_from(value)
			.map_err(|_| anyhow!(DecodeError::format(format!("value {value} of {} isn't a byte", band.name()))))
	}

	fn next_index(&mut self, band: OperandBand, wide: bool) -> Result<u16> {
		let value = self.next(band)?;
		match u16::try_from(value) {
			Ok(index) if wide || index <= 0xff => Ok(index),
			_ => bail!(DecodeError::format(format!("local variable index {value} doesn't fit the instruction"))),
		}
	}

	fn next_short(&mut self, band: OperandBand) -> Result<i16> {
		let value = self.next(band)?;
		i16::try_from(value)
			.map_err(|_| anyhow!(DecodeError::format(format!("value {value} of {} isn't a short", band.name()))))
	}

	fn next_class(&mut self, pool: &ConstantPool, this_class: CpRef) -> Result<CpRef> {
		match self.next(OperandBand::ClassRef)? {
			0 => Ok(this_class),
			index => pool.resolve(index - 1, CpKind::Class),
		}
	}

	/// Reads the instructions of the method.
	///
	/// Branch and switch targets are instruction indices, with an `aload_0` in front of a self linker
	/// opcode counting as an instruction of its own.
	pub(crate) fn assign(mut self, pool: &ConstantPool, this_class: CpRef, super_class: Option<CpRef>) -> Result<Vec<PendingOp>> {
		use OperandBand::*;

		let super_class = || super_class
			.ok_or_else(|| anyhow!(DecodeError::format("reference to the super class of a class without one")));
		let pick = |members: &[CpRef], index: i64, what: &str| -> Result<CpRef> {
			match usize::try_from(index).ok().and_then(|i| members.get(i)) {
				Some(&member) => Ok(member),
				None => bail!(DecodeError::UnresolvedReference {
					index,
					expected: what.to_owned(),
					message: format!("there are only {} of them", members.len()),
				}),
			}
		};

		let mut ops = Vec::new();
		let mut last_new = None;
		let codes = self.codes;
		let mut codes = codes.iter();
		while let Some(&opcode) = codes.next() {
			let op = match Shape::of(opcode)? {
				Shape::Simple => Op::Simple(opcode),
				Shape::Byte => Op::Byte { opcode, value: self.next_u8(Byte)? },
				Shape::Short => Op::Short(self.next_short(Short)?),
				Shape::Local => Op::Local { opcode, index: self.next_index(Local, false)?, wide: false },
				Shape::Iinc => Op::Iinc {
					index: self.next_index(Local, false)?,
					increment: self.next_u8(Byte)? as i8 as i16,
					wide: false,
				},
				Shape::Wide => {
					let Some(&next) = codes.next() else {
						bail!(DecodeError::format("wide at the end of the byte codes"));
					};
					match Shape::of(next)? {
						Shape::Local => Op::Local { opcode: next, index: self.next_index(Local, true)?, wide: true },
						Shape::Iinc => Op::Iinc {
							index: self.next_index(Local, true)?,
							increment: self.next_short(Short)?,
							wide: true,
						},
						_ => bail!(DecodeError::format(format!("opcode {next} can't be wide"))),
					}
				},
				Shape::Constant { opcode, band: ClassRef, .. } => Op::Constant { opcode, entry: self.next_class(pool, this_class)? },
				Shape::Constant { opcode, band, kind } => Op::Constant { opcode, entry: pool.resolve(self.next(band)?, kind)? },
				Shape::Field => Op::Field { opcode, field: pool.resolve(self.next(FieldRef)?, CpKind::Field)? },
				Shape::Method => Op::Method { opcode, method: pool.resolve(self.next(MethodRef)?, CpKind::Method)? },
				Shape::InterfaceMethod => {
					let method = pool.resolve(self.next(IMethodRef)?, CpKind::IMethod)?;
					let slots = argument_slots(pool.member_descriptor(method)?)?;
					let count = u8::try_from(slots + 1)
						.map_err(|_| anyhow!(DecodeError::format(format!("interface method {method} has too many arguments"))))?;
					Op::InterfaceMethod { method, count }
				},
				Shape::Class => {
					let class = self.next_class(pool, this_class)?;
					if opcode == insn::new {
						last_new = Some(class);
					}
					Op::Class { opcode, class }
				},
				Shape::MultiANewArray => Op::MultiANewArray {
					class: self.next_class(pool, this_class)?,
					dimensions: self.next_u8(Byte)?,
				},
				Shape::SelfLinker { opcode, aload_0, band } => {
					let index = self.next(band)?;
					let member = match band {
						ThisField => pick(pool.fields_of(this_class), index, "field of this class")?,
						SuperField => pick(pool.fields_of(super_class()?), index, "field of the super class")?,
						ThisMethod => pick(pool.methods_of(this_class), index, "method of this class")?,
						_ => pick(pool.methods_of(super_class()?), index, "method of the super class")?,
					};
					if aload_0 {
						ops.push(PendingOp::Done(Op::Simple(insn::aload_0)));
					}
					if opcode <= insn::putfield {
						Op::Field { opcode, field: member }
					} else {
						Op::Method { opcode, method: member }
					}
				},
				Shape::Init(of) => {
					let class = match of {
						InitOf::This => this_class,
						InitOf::Super => super_class()?,
						InitOf::New => last_new
							.ok_or_else(|| anyhow!(DecodeError::format("invokespecial of a constructor of a new class, before any new")))?,
					};
					let method = pick(&pool.initializers_of(class)?, self.next(InitRef)?, "constructor")?;
					Op::Method { opcode: insn::invokespecial, method }
				},
				Shape::Branch => {
					let target = ops.len() as i64 + self.next(Label)?;
					ops.push(PendingOp::Branch { opcode, target });
					continue;
				},
				Shape::TableSwitch => {
					let here = ops.len() as i64;
					let n = to_length(CaseCount.name(), self.next(CaseCount)?)?;
					let low = self.next(CaseValue)? as i32;
					let default = here + self.next(Label)?;
					let targets = (0..n)
						.map(|_| Ok(here + self.next(Label)?))
						.collect::<Result<Vec<_>>>()?;
					ops.push(PendingOp::TableSwitch { default, low, targets });
					continue;
				},
				Shape::LookupSwitch => {
					let here = ops.len() as i64;
					let n = to_length(CaseCount.name(), self.next(CaseCount)?)?;
					let keys = (0..n)
						.map(|_| Ok(self.next(CaseValue)? as i32))
						.collect::<Result<Vec<_>>>()?;
					let default = here + self.next(Label)?;
					let pairs = keys.into_iter()
						.map(|key| Ok((key, here + self.next(Label)?)))
						.collect::<Result<Vec<_>>>()?;
					ops.push(PendingOp::LookupSwitch { default, pairs });
					continue;
				},
				Shape::RefEscape => {
					let size = self.next(EscRefSize)?;
					let size = match size {
						1 | 2 => size as u8,
						_ => bail!(DecodeError::format(format!("constant pool reference of {size} bytes"))),
					};
					let entry = pool.resolve_any(self.next(EscRef)?)?;
					Op::RefEscape { size, entry }
				},
				Shape::ByteEscape => {
					let size = to_length(EscSize.name(), self.next(EscSize)?)?;
					let bytes = (0..size)
						.map(|_| self.next_u8(EscByte))
						.collect::<Result<Vec<_>>>()?;
					Op::ByteEscape(bytes)
				},
			};
			ops.push(PendingOp::Done(op));
		}
		Ok(ops)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pack_coding::{Bhsd, BRANCH5, BYTE1, DELTA5, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::bytecode::{insn, Op, OperandBands, PendingOp};
	use crate::cp::{CpEntry, CpKind};
	use crate::DecodeError;
	use crate::stream::BandReader;

	fn encode(bands: &[(Bhsd, &[i64])]) -> Vec<u8> {
		let mut out = Vec::new();
		for (coding, values) in bands {
			coding.encode_values(values, &mut out).unwrap();
		}
		out
	}

	fn utf8(s: &str) -> CpEntry {
		CpEntry::Utf8(JavaStr::from_str(s).to_owned())
	}

	/// Encodes the byte codes of some methods, followed by the given operand bands.
	fn data(methods: &[&[u8]], operands: &[(Bhsd, &[i64])]) -> Vec<u8> {
		let mut out = Vec::new();
		for codes in methods {
			out.extend_from_slice(codes);
			out.push(insn::end_marker);
		}
		out.extend(encode(operands));
		out
	}

	#[test]
	fn operands_split_between_methods() -> Result<()> {
		let pool = crate::cp::testing::pool(vec![utf8(""), utf8("A"), CpEntry::Int(1), CpEntry::Int(2)])?;

		let data = data(
			&[
				&[insn::bipush, insn::ildc, insn::ifeq, insn::r#return],
				&[insn::iload, insn::ildc, insn::ireturn],
			],
			&[
				// bc_case_count, bc_case_value
				(UNSIGNED5, &[]),
				(DELTA5, &[]),
				// bc_byte, bc_short, bc_local, bc_label
				(BYTE1, &[200]),
				(DELTA5, &[]),
				(UNSIGNED5, &[3]),
				(BRANCH5, &[2]),
				// bc_intref
				(DELTA5, &[1, 0]),
			],
		);
		let mut reader = BandReader::new(&data);
		let bands = OperandBands::read(&mut reader, 2)?;
		assert_eq!(reader.remaining(), 0);
		assert!(bands.code(2).is_err());

		let this_class = crate::cp::testing::cp(CpKind::Class, 0);
		assert_eq!(bands.code(0)?.assign(&pool, this_class, None)?, vec![
			PendingOp::Done(Op::Byte { opcode: insn::bipush, value: 200 }),
			PendingOp::Done(Op::Constant { opcode: insn::ldc, entry: pool.resolve(1, CpKind::Int)? }),
			PendingOp::Branch { opcode: insn::ifeq, target: 4 },
			PendingOp::Done(Op::Simple(insn::r#return)),
		]);
		assert_eq!(bands.code(1)?.assign(&pool, this_class, None)?, vec![
			PendingOp::Done(Op::Local { opcode: insn::iload, index: 3, wide: false }),
			PendingOp::Done(Op::Constant { opcode: insn::ldc, entry: pool.resolve(0, CpKind::Int)? }),
			PendingOp::Done(Op::Simple(insn::ireturn)),
		]);
		Ok(())
	}

	#[test]
	fn switches_and_escapes() -> Result<()> {
		let pool = crate::cp::testing::pool(vec![utf8(""), utf8("A")])?;
		let data = data(
			&[&[insn::tableswitch, insn::lookupswitch, insn::wide, insn::iinc, insn::byte_escape, insn::ref_escape, insn::r#return]],
			&[
				// bc_case_count
				(UNSIGNED5, &[2, 1]),
				// bc_case_value: low of the tableswitch, the key of the lookupswitch
				(DELTA5, &[10, -5]),
				(BYTE1, &[]),
				// bc_short
				(DELTA5, &[-300]),
				// bc_local
				(UNSIGNED5, &[500]),
				// bc_label: tableswitch default and 2 cases, lookupswitch default and 1 case
				(BRANCH5, &[6, 1, 2, 5, -1]),
				(DELTA5, &[]), (DELTA5, &[]), (DELTA5, &[]), (DELTA5, &[]), (DELTA5, &[]),
				(UNSIGNED5, &[]), (DELTA5, &[]), (UNSIGNED5, &[]), (DELTA5, &[]),
				(UNSIGNED5, &[]), (UNSIGNED5, &[]), (UNSIGNED5, &[]), (UNSIGNED5, &[]), (UNSIGNED5, &[]),
				// bc_escref, bc_escrefsize, bc_escsize, bc_escbyte
				(UNSIGNED5, &[1]),
				(UNSIGNED5, &[2]),
				(UNSIGNED5, &[3]),
				(BYTE1, &[1, 2, 3]),
			],
		);
		let mut reader = BandReader::new(&data);
		let bands = OperandBands::read(&mut reader, 1)?;
		assert_eq!(reader.remaining(), 0);

		let this_class = crate::cp::testing::cp(CpKind::Class, 0);
		assert_eq!(bands.code(0)?.assign(&pool, this_class, None)?, vec![
			PendingOp::TableSwitch { default: 6, low: 10, targets: vec![1, 2] },
			PendingOp::LookupSwitch { default: 6, pairs: vec![(-5, 0)] },
			PendingOp::Done(Op::Iinc { index: 500, increment: -300, wide: true }),
			PendingOp::Done(Op::ByteEscape(vec![1, 2, 3])),
			PendingOp::Done(Op::RefEscape { size: 2, entry: pool.resolve_any(1)? }),
			PendingOp::Done(Op::Simple(insn::r#return)),
		]);
		Ok(())
	}

	#[test]
	fn invokedynamic_is_rejected() {
		let data = data(&[&[insn::invokedynamic]], &[]);
		let mut reader = BandReader::new(&data);
		let error = OperandBands::read(&mut reader, 1).unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::Format(_))));
	}
}
