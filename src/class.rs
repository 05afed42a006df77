//! The classes and files of a decoded segment.
//!
//! All references point into the constant pool of the segment. Each [`ClassFile`] lists the entries of
//! that pool it uses, in the order they get in the constant pool of the class file.

use indexmap::IndexSet;
use java_string::JavaString;
use crate::bytecode::Instruction;
use crate::cp::CpRef;
use crate::ic::InnerClass;
use crate::metadata::{Annotation, ElementValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
	pub major: u16,
	pub minor: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
	pub version: Version,
	pub access: u16,
	pub this_class: CpRef,
	pub super_class: Option<CpRef>,
	pub interfaces: Vec<CpRef>,

	pub fields: Vec<Field>,
	pub methods: Vec<Method>,

	pub has_deprecated_attribute: bool,
	/// The `Utf8` entry with the name of the source file.
	pub source_file: Option<CpRef>,
	pub enclosing_method: Option<EnclosingMethod>,
	pub signature: Option<CpRef>,
	pub inner_classes: Option<Vec<InnerClass>>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,

	/// Attributes without a meaning known to the decoder.
	pub attributes: Vec<Attribute>,

	/// The entries of the class file constant pool, in order.
	///
	/// The entries the class refers to with a single byte come first.
	pub pool: IndexSet<CpRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclosingMethod {
	pub class: CpRef,
	/// The `Descr` entry of the method, absent if the class isn't inside a method.
	pub method: Option<CpRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub access: u16,
	pub name: CpRef,
	pub descriptor: CpRef,

	pub has_deprecated_attribute: bool,
	pub constant_value: Option<CpRef>,
	pub signature: Option<CpRef>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,

	pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
	pub access: u16,
	pub name: CpRef,
	pub descriptor: CpRef,

	pub has_deprecated_attribute: bool,
	pub code: Option<Code>,
	pub exceptions: Option<Vec<CpRef>>,
	pub signature: Option<CpRef>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub runtime_invisible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub annotation_default: Option<ElementValue>,

	pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
	pub max_stack: u16,
	pub max_locals: u16,
	pub instructions: Vec<Instruction>,
	/// The number of bytes of all instructions.
	pub code_length: u32,
	pub exception_table: Vec<ExceptionHandler>,

	pub line_numbers: Option<Vec<LineNumber>>,
	pub local_variables: Option<Vec<LocalVariable>>,
	pub local_variable_types: Option<Vec<LocalVariable>>,

	/// Other attributes, with byte code indices already converted to offsets.
	pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
	pub start: u32,
	pub end: u32,
	pub handler: u32,
	/// The `Class` entry of the caught exception, absent for `finally` blocks.
	pub catch: Option<CpRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
	pub start: u32,
	pub line: u16,
}

/// An entry of a `LocalVariableTable` or `LocalVariableTypeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
	pub start: u32,
	pub length: u32,
	pub name: CpRef,
	/// A descriptor, or a signature for the `LocalVariableTypeTable`.
	pub descriptor: CpRef,
	pub index: u16,
}

/// An attribute with its contents as the values given by its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	/// The `Utf8` entry with the name.
	pub name: CpRef,
	pub values: Vec<AttributeValue>,
}

/// A value of an attribute, stored in `size` bytes in the class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeValue {
	Int { size: u8, value: i64 },
	/// A constant pool index, `0` if there's no entry.
	Ref { size: u8, entry: Option<CpRef> },
}

/// A file of the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
	pub name: JavaString,
	pub modtime: i64,
	/// Whether the file should be stored compressed.
	pub deflate_hint: bool,
	pub contents: FileContents,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileContents {
	Bytes(Vec<u8>),
	/// The assembled class with this index in [`crate::DecodedSegment::classes`].
	Class(usize),
}
