//! Opcodes of the packed byte codes.
//!
//! The values below `0xca` are the standard class file opcodes, only the ones with operands or a
//! special meaning while unpacking are listed. The values from `0xca` on only appear in the
//! `bc_codes` band.
#![allow(non_upper_case_globals)]

pub const nop: u8 = 0x00;
pub const iconst_0: u8 = 0x03;
pub const iconst_1: u8 = 0x04;
pub const bipush: u8 = 0x10;
pub const sipush: u8 = 0x11;
pub const ldc: u8 = 0x12;
pub const ldc_w: u8 = 0x13;
pub const ldc2_w: u8 = 0x14;
pub const iload: u8 = 0x15;
pub const lload: u8 = 0x16;
pub const fload: u8 = 0x17;
pub const dload: u8 = 0x18;
pub const aload: u8 = 0x19;
pub const aload_0: u8 = 0x2a;
pub const istore: u8 = 0x36;
pub const lstore: u8 = 0x37;
pub const fstore: u8 = 0x38;
pub const dstore: u8 = 0x39;
pub const astore: u8 = 0x3a;
pub const iinc: u8 = 0x84;
pub const ifeq: u8 = 0x99;
pub const if_acmpne: u8 = 0xa6;
pub const goto: u8 = 0xa7;
pub const jsr: u8 = 0xa8;
pub const ret: u8 = 0xa9;
pub const tableswitch: u8 = 0xaa;
pub const lookupswitch: u8 = 0xab;
pub const ireturn: u8 = 0xac;
pub const r#return: u8 = 0xb1;
pub const getstatic: u8 = 0xb2;
pub const putstatic: u8 = 0xb3;
pub const getfield: u8 = 0xb4;
pub const putfield: u8 = 0xb5;
pub const invokevirtual: u8 = 0xb6;
pub const invokespecial: u8 = 0xb7;
pub const invokestatic: u8 = 0xb8;
pub const invokeinterface: u8 = 0xb9;
pub const invokedynamic: u8 = 0xba;
pub const new: u8 = 0xbb;
pub const newarray: u8 = 0xbc;
pub const anewarray: u8 = 0xbd;
pub const checkcast: u8 = 0xc0;
pub const instanceof: u8 = 0xc1;
pub const wide: u8 = 0xc4;
pub const multianewarray: u8 = 0xc5;
pub const ifnull: u8 = 0xc6;
pub const ifnonnull: u8 = 0xc7;
pub const goto_w: u8 = 0xc8;
pub const jsr_w: u8 = 0xc9;

/// The first of the opcodes for a field or method access on the current class or its super class.
///
/// They're ordered as `getstatic` to `invokestatic`, first on the current class, then with an `aload_0`
/// in front, then on the super class, and then on the super class with an `aload_0` in front.
pub const self_linker_op: u8 = 0xca;
pub const self_linker_limit: u8 = self_linker_op + 4 * 7;
/// `invokespecial` of a constructor of the current class.
pub const invokeinit_self: u8 = 0xe6;
/// `invokespecial` of a constructor of the super class.
pub const invokeinit_super: u8 = 0xe7;
/// `invokespecial` of a constructor of the class created by the last `new`.
pub const invokeinit_new: u8 = 0xe8;
/// `ldc` of a class.
pub const cldc: u8 = 0xe9;
/// `ldc` of an int.
pub const ildc: u8 = 0xea;
/// `ldc` of a float.
pub const fldc: u8 = 0xeb;
pub const cldc_w: u8 = 0xec;
pub const ildc_w: u8 = 0xed;
pub const fldc_w: u8 = 0xee;
/// `ldc2_w` of a double.
pub const dldc2_w: u8 = 0xef;
/// A constant pool reference that isn't an operand of any known instruction.
pub const ref_escape: u8 = 0xfd;
/// Bytes that aren't part of any known instruction.
pub const byte_escape: u8 = 0xfe;
/// Ends the byte codes of a method.
pub const end_marker: u8 = 0xff;
