//! Putting the classes together from the bands of a segment.
//!
//! Each class only reads from the [`SegmentBands`], so classes can be assembled in any order.

use std::collections::{BTreeSet, HashMap};
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexSet;
use java_string::JavaStr;
use log::trace;
use crate::attribute::{AttributeContext, AttributeData, LayoutKind, Predefined, RawAttribute};
use crate::attribute::layout::{IntKind, Value};
use crate::bytecode::{fix_up, lay_out, BciTable};
use crate::class::{Attribute, AttributeValue, ClassFile, Code, EnclosingMethod, ExceptionHandler, Field, LineNumber, LocalVariable, Method, Version};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::descriptor::argument_slots;
use crate::DecodeError;
use crate::ic::{InnerClass, LocalInnerClass};
use crate::metadata::{Annotation, ElementValue, Metadata, MetadataKind};
use crate::segment::{ClassBands, MemberBands, SegmentBands};

const ACC_STATIC: u16 = 0x0008;

/// The entries of the segment constant pool a class uses.
struct PoolCollector<'a> {
	pool: &'a ConstantPool,
	entries: IndexSet<CpRef>,
	/// The entries that need an index below 256.
	narrow: IndexSet<CpRef>,
}

impl<'a> PoolCollector<'a> {
	fn new(pool: &'a ConstantPool) -> PoolCollector<'a> {
		PoolCollector { pool, entries: IndexSet::new(), narrow: IndexSet::new() }
	}

	/// Adds an entry and everything it refers to.
	fn add(&mut self, cp: CpRef) -> Result<()> {
		if self.entries.insert(cp) {
			for dependency in self.pool.get(cp)?.dependencies() {
				self.add(dependency)?;
			}
		}
		Ok(())
	}

	fn add_narrow(&mut self, cp: CpRef) -> Result<()> {
		self.narrow.insert(cp);
		self.add(cp)
	}

	fn add_all(&mut self, entries: impl IntoIterator<Item=CpRef>) -> Result<()> {
		entries.into_iter().try_for_each(|cp| self.add(cp))
	}

	fn classes(&self) -> Vec<CpRef> {
		self.entries.iter()
			.filter(|cp| cp.kind() == CpKind::Class)
			.copied()
			.collect()
	}

	/// Orders the entries: the ones used with a single byte index first, then all others, each in the
	/// order of the segment constant pool.
	fn finish(self) -> Result<IndexSet<CpRef>> {
		// index 0 isn't used
		if self.narrow.len() > 255 {
			bail!(DecodeError::format(format!("{} constants are loaded with ldc, but only 255 fit", self.narrow.len())));
		}
		let mut narrow: Vec<CpRef> = self.narrow.iter().copied().collect();
		narrow.sort();
		let mut rest: Vec<CpRef> = self.entries.into_iter()
			.filter(|cp| !self.narrow.contains(cp))
			.collect();
		rest.sort();
		Ok(narrow.into_iter().chain(rest).collect())
	}
}

/// Reads the values of an attribute in the order of its layout.
struct ValueReader<'v> {
	name: &'v JavaStr,
	values: std::slice::Iter<'v, AttributeValue>,
}

impl ValueReader<'_> {
	fn mismatch(&self) -> anyhow::Error {
		anyhow!(DecodeError::format(format!("contents of attribute {:?} don't match its meaning", self.name)))
	}

	fn int(&mut self) -> Result<i64> {
		match self.values.next() {
			Some(&AttributeValue::Int { value, .. }) => Ok(value),
			_ => Err(self.mismatch()),
		}
	}

	fn u16(&mut self) -> Result<u16> {
		let value = self.int()?;
		u16::try_from(value).map_err(|_| self.mismatch())
	}

	fn u32(&mut self) -> Result<u32> {
		let value = self.int()?;
		u32::try_from(value).map_err(|_| self.mismatch())
	}

	fn entry(&mut self) -> Result<Option<CpRef>> {
		match self.values.next() {
			Some(&AttributeValue::Ref { entry, .. }) => Ok(entry),
			_ => Err(self.mismatch()),
		}
	}

	fn required(&mut self) -> Result<CpRef> {
		self.entry()?.ok_or_else(|| self.mismatch())
	}

	/// Reads a count and then that many elements.
	fn list<T>(&mut self, mut element: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
		let count = self.int()?;
		(0..count).map(|_| element(self)).collect()
	}

	fn finish(mut self) -> Result<()> {
		match self.values.next() {
			None => Ok(()),
			Some(_) => Err(self.mismatch()),
		}
	}
}

/// An attribute converted into what it means.
enum Known {
	SourceFile(CpRef),
	EnclosingMethod(EnclosingMethod),
	Signature(CpRef),
	Deprecated,
	Version(Version),
	ConstantValue(CpRef),
	Exceptions(Vec<CpRef>),
	LineNumbers(Vec<LineNumber>),
	LocalVariables(Vec<LocalVariable>),
	LocalVariableTypes(Vec<LocalVariable>),
	Annotations { visible: bool, annotations: Vec<Annotation> },
	ParameterAnnotations { visible: bool, parameters: Vec<Vec<Annotation>> },
	AnnotationDefault(ElementValue),
	InnerClasses(Vec<LocalInnerClass>),
	Code,
	Other(Attribute),
}

/// Converts byte code indices into offsets, using the instruction offsets `table` of the code.
///
/// An index of a `PO` element is relative to the previous index, and a length of an `O` element is
/// relative to the previous offset.
fn renumber(values: &[Value], table: Option<&BciTable>) -> Result<Vec<AttributeValue>> {
	let mut previous_index = 0;
	let mut previous_offset = 0;
	values.iter()
		.map(|value| -> Result<AttributeValue> { Ok(match *value {
			Value::Ref { size, entry } => AttributeValue::Ref { size, entry },
			Value::Int { kind: kind @ (IntKind::Bci | IntKind::BciOffset | IntKind::BciLength), size, value } => {
				let table = table
					.ok_or_else(|| anyhow!(DecodeError::format("byte code index in an attribute that isn't part of a code")))?;
				let index = if kind == IntKind::Bci { value } else { previous_index + value };
				let offset = table.offset(index)? as i64;
				previous_index = index;
				let value = if kind == IntKind::BciLength { offset - previous_offset } else { offset };
				previous_offset = offset;
				AttributeValue::Int { size, value }
			},
			Value::Int { size, value, .. } => AttributeValue::Int { size, value },
		}) })
		.collect()
}

fn annotation_entries(annotation: &Annotation, out: &mut Vec<CpRef>) {
	out.push(annotation.type_descriptor);
	for pair in &annotation.pairs {
		out.push(pair.name);
		element_value_entries(&pair.value, out);
	}
}

fn element_value_entries(value: &ElementValue, out: &mut Vec<CpRef>) {
	match value {
		ElementValue::Const { value, .. } => out.push(*value),
		ElementValue::Enum { type_descriptor, const_name } => out.extend([*type_descriptor, *const_name]),
		ElementValue::Class(class) => out.push(*class),
		ElementValue::Annotation(annotation) => annotation_entries(annotation, out),
		ElementValue::Array(values) => values.iter().for_each(|value| element_value_entries(value, out)),
	}
}

pub(crate) struct ClassAssembler<'a> {
	bands: &'a SegmentBands,
}

impl<'a> ClassAssembler<'a> {
	pub(crate) fn new(bands: &'a SegmentBands) -> ClassAssembler<'a> {
		ClassAssembler { bands }
	}

	/// Assembles the class with the given index.
	pub(crate) fn assemble(&self, index: usize) -> Result<ClassFile> {
		let bands = self.bands;
		let pool = &bands.pool;
		let class = bands.classes.get(index)
			.with_context(|| anyhow!("there are only {} classes", bands.classes.len()))?;

		let mut entries = PoolCollector::new(pool);
		entries.add(class.this_class)?;
		entries.add_all(class.super_class)?;
		entries.add_all(class.interfaces.iter().copied())?;

		let fields = class.fields.iter()
			.enumerate()
			.map(|(i, field)| self.field(field, &mut entries).with_context(|| anyhow!("in field {i}")))
			.collect::<Result<Vec<_>>>()?;
		let methods = class.methods.iter()
			.enumerate()
			.map(|(i, method)| self.method(class, method, &mut entries).with_context(|| anyhow!("in method {i}")))
			.collect::<Result<Vec<_>>>()?;

		let mut class_file = ClassFile {
			version: Version {
				major: bands.header.default_class_major_version,
				minor: bands.header.default_class_minor_version,
			},
			access: class.attributes.access_flags(),
			this_class: class.this_class,
			super_class: class.super_class,
			interfaces: class.interfaces.clone(),
			fields,
			methods,
			has_deprecated_attribute: false,
			source_file: None,
			enclosing_method: None,
			signature: None,
			inner_classes: None,
			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			attributes: Vec::new(),
			pool: IndexSet::new(),
		};

		let mut local_inner_classes = None;
		for attribute in &class.attributes.attributes {
			match self.convert(AttributeContext::Class, attribute, None, &mut entries)? {
				Known::SourceFile(source_file) => class_file.source_file = Some(source_file),
				Known::EnclosingMethod(enclosing_method) => class_file.enclosing_method = Some(enclosing_method),
				Known::Signature(signature) => class_file.signature = Some(signature),
				Known::Deprecated => class_file.has_deprecated_attribute = true,
				Known::Version(version) => class_file.version = version,
				Known::Annotations { visible: true, annotations } => class_file.runtime_visible_annotations = annotations,
				Known::Annotations { visible: false, annotations } => class_file.runtime_invisible_annotations = annotations,
				Known::InnerClasses(local) => local_inner_classes = Some((attribute.name, local)),
				Known::Other(attribute) => class_file.attributes.push(attribute),
				_ => bail!(DecodeError::format(format!("attribute {} can't be on a class", attribute.index))),
			}
		}

		let local = local_inner_classes.as_ref().map(|(_, local)| local.as_slice());
		class_file.inner_classes = self.inner_classes(class.this_class, local, &entries)?;
		if let Some(inner_classes) = &class_file.inner_classes {
			let name = local_inner_classes.map(|(name, _)| name)
				.or(bands.inner_classes_name)
				.with_context(|| anyhow!("no name for the inner classes attribute"))?;
			entries.add(name)?;
			for inner_class in inner_classes {
				entries.add(inner_class.inner)?;
				entries.add_all(inner_class.outer)?;
				entries.add_all(inner_class.name)?;
			}
		}

		class_file.pool = entries.finish()?;
		trace!("assembled class {} with {} constant pool entries", pool.class_name(class.this_class)?, class_file.pool.len());
		Ok(class_file)
	}

	fn field(&self, field: &MemberBands, entries: &mut PoolCollector) -> Result<Field> {
		let (name, descriptor) = self.bands.pool.descr(field.descr)?;
		entries.add(name)?;
		entries.add(descriptor)?;

		let mut out = Field {
			access: field.attributes.access_flags(),
			name,
			descriptor,
			has_deprecated_attribute: false,
			constant_value: None,
			signature: None,
			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			attributes: Vec::new(),
		};
		for attribute in &field.attributes.attributes {
			match self.convert(AttributeContext::Field, attribute, None, entries)? {
				Known::ConstantValue(constant) => out.constant_value = Some(constant),
				Known::Signature(signature) => out.signature = Some(signature),
				Known::Deprecated => out.has_deprecated_attribute = true,
				Known::Annotations { visible: true, annotations } => out.runtime_visible_annotations = annotations,
				Known::Annotations { visible: false, annotations } => out.runtime_invisible_annotations = annotations,
				Known::Other(attribute) => out.attributes.push(attribute),
				_ => bail!(DecodeError::format(format!("attribute {} can't be on a field", attribute.index))),
			}
		}
		Ok(out)
	}

	fn method(&self, class: &ClassBands, method: &MemberBands, entries: &mut PoolCollector) -> Result<Method> {
		let pool = &self.bands.pool;
		let (name, descriptor) = pool.descr(method.descr)?;
		entries.add(name)?;
		entries.add(descriptor)?;
		let access = method.attributes.access_flags();

		let mut out = Method {
			access,
			name,
			descriptor,
			has_deprecated_attribute: false,
			code: None,
			exceptions: None,
			signature: None,
			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_parameter_annotations: None,
			runtime_invisible_parameter_annotations: None,
			annotation_default: None,
			attributes: Vec::new(),
		};
		for attribute in &method.attributes.attributes {
			match self.convert(AttributeContext::Method, attribute, None, entries)? {
				Known::Code => {
					let code = method.code
						.with_context(|| anyhow!("method has a code attribute, but no code"))?;
					let (name, descriptor) = (pool.utf8(name)?, pool.text(descriptor)?);
					let code = self.code(class, access, descriptor, code, entries)
						.with_context(|| anyhow!("in code of {name}{descriptor}"))?;
					out.code = Some(code);
				},
				Known::Exceptions(exceptions) => out.exceptions = Some(exceptions),
				Known::Signature(signature) => out.signature = Some(signature),
				Known::Deprecated => out.has_deprecated_attribute = true,
				Known::Annotations { visible: true, annotations } => out.runtime_visible_annotations = annotations,
				Known::Annotations { visible: false, annotations } => out.runtime_invisible_annotations = annotations,
				Known::ParameterAnnotations { visible: true, parameters } => out.runtime_visible_parameter_annotations = Some(parameters),
				Known::ParameterAnnotations { visible: false, parameters } => out.runtime_invisible_parameter_annotations = Some(parameters),
				Known::AnnotationDefault(value) => out.annotation_default = Some(value),
				Known::Other(attribute) => out.attributes.push(attribute),
				_ => bail!(DecodeError::format(format!("attribute {} can't be on a method", attribute.index))),
			}
		}
		Ok(out)
	}

	fn code(&self, class: &ClassBands, access: u16, descriptor: &JavaStr, index: usize, entries: &mut PoolCollector) -> Result<Code> {
		let bands = self.bands;
		let code = bands.codes.get(index)
			.with_context(|| anyhow!("there are only {} code headers", bands.codes.len()))?;

		let ops = bands.bytecodes.code(index)?
			.assign(&bands.pool, class.this_class, class.super_class)?;
		let table = lay_out(&ops)?;
		let instructions = fix_up(ops, &table)?;
		for instruction in &instructions {
			if let Some(entry) = instruction.op.entry() {
				if instruction.op.needs_narrow_index() {
					entries.add_narrow(entry)?;
				} else {
					entries.add(entry)?;
				}
			}
		}

		let exception_table = code.handlers.iter()
			.map(|handler| -> Result<ExceptionHandler> {
				let start = handler.start;
				let end = start + handler.end;
				let catch = end + handler.catch;
				entries.add_all(handler.class)?;
				Ok(ExceptionHandler {
					start: table.offset(start)?,
					end: table.offset(end)?,
					handler: table.offset(catch)?,
					catch: handler.class,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		let receiver = if access & ACC_STATIC == 0 { 1 } else { 0 };
		let max_locals = code.max_na_locals as u32 + argument_slots(descriptor)? as u32 + receiver;
		let max_locals = u16::try_from(max_locals)
			.map_err(|_| anyhow!(DecodeError::format(format!("max locals {max_locals} is out of range"))))?;

		let mut out = Code {
			max_stack: code.max_stack,
			max_locals,
			instructions,
			code_length: table.code_length(),
			exception_table,
			line_numbers: None,
			local_variables: None,
			local_variable_types: None,
			attributes: Vec::new(),
		};
		for attribute in &code.attributes.attributes {
			match self.convert(AttributeContext::Code, attribute, Some(&table), entries)? {
				Known::LineNumbers(line_numbers) => out.line_numbers = Some(line_numbers),
				Known::LocalVariables(variables) => out.local_variables = Some(variables),
				Known::LocalVariableTypes(variables) => out.local_variable_types = Some(variables),
				Known::Other(attribute) => out.attributes.push(attribute),
				_ => bail!(DecodeError::format(format!("attribute {} can't be on a code", attribute.index))),
			}
		}
		Ok(out)
	}

	/// Finds out what an attribute means, and adds the entries it uses to the pool.
	fn convert(&self, context: AttributeContext, attribute: &RawAttribute, table: Option<&BciTable>, entries: &mut PoolCollector) -> Result<Known> {
		let pool = &self.bands.pool;
		let layout = self.bands.layouts.get(context, attribute.index)?;
		let name = pool.utf8(attribute.name)?;

		let known = match (&layout.kind, &attribute.data) {
			(LayoutKind::Generic { predefined, .. }, AttributeData::Values(values)) => {
				let values = renumber(values, table)
					.with_context(|| anyhow!("in attribute {name:?}"))?;
				entries.add_all(values.iter().filter_map(|value| match value {
					AttributeValue::Ref { entry, .. } => *entry,
					AttributeValue::Int { .. } => None,
				}))?;
				let mut reader = ValueReader { name, values: values.iter() };
				let known = match predefined {
					None | Some(Predefined::StackMapTable) => {
						entries.add(attribute.name)?;
						return Ok(Known::Other(Attribute { name: attribute.name, values: values.clone() }));
					},
					Some(Predefined::SourceFile) => Known::SourceFile(reader.required()?),
					Some(Predefined::EnclosingMethod) => Known::EnclosingMethod(EnclosingMethod {
						class: reader.required()?,
						method: reader.entry()?,
					}),
					Some(Predefined::Signature) => Known::Signature(reader.required()?),
					Some(Predefined::Deprecated) => Known::Deprecated,
					Some(Predefined::ClassFileVersion) => {
						let minor = reader.u16()?;
						let major = reader.u16()?;
						reader.finish()?;
						// not an attribute of the class file
						return Ok(Known::Version(Version { major, minor }));
					},
					Some(Predefined::ConstantValue) => Known::ConstantValue(reader.required()?),
					Some(Predefined::Exceptions) => Known::Exceptions(reader.list(|reader| reader.required())?),
					Some(Predefined::LineNumberTable) => Known::LineNumbers(reader.list(|reader| Ok(LineNumber {
						start: reader.u32()?,
						line: reader.u16()?,
					}))?),
					Some(Predefined::LocalVariableTable) => Known::LocalVariables(reader.list(local_variable)?),
					Some(Predefined::LocalVariableTypeTable) => Known::LocalVariableTypes(reader.list(local_variable)?),
				};
				reader.finish()?;
				known
			},
			(&LayoutKind::Metadata(kind), AttributeData::Metadata(metadata)) => {
				let visible = matches!(kind, MetadataKind::Visible | MetadataKind::VisibleParameter);
				let mut refs = Vec::new();
				match metadata {
					Metadata::Annotations(annotations) => annotations.iter()
						.for_each(|annotation| annotation_entries(annotation, &mut refs)),
					Metadata::ParameterAnnotations(parameters) => parameters.iter().flatten()
						.for_each(|annotation| annotation_entries(annotation, &mut refs)),
					Metadata::AnnotationDefault(value) => element_value_entries(value, &mut refs),
				}
				entries.add_all(refs)?;
				match metadata.clone() {
					Metadata::Annotations(annotations) => Known::Annotations { visible, annotations },
					Metadata::ParameterAnnotations(parameters) => Known::ParameterAnnotations { visible, parameters },
					Metadata::AnnotationDefault(value) => Known::AnnotationDefault(value),
				}
			},
			// the name is added once it's known whether the attribute is written at all
			(LayoutKind::InnerClasses, AttributeData::InnerClasses(local)) => return Ok(Known::InnerClasses(local.clone())),
			(LayoutKind::Code, AttributeData::Code) => Known::Code,
			_ => bail!(DecodeError::format(format!("attribute {name:?} was read with a different layout"))),
		};
		entries.add(attribute.name)?;
		Ok(known)
	}

	/// Computes the `InnerClasses` attribute of a class from the global table and the local attribute.
	///
	/// The class gets the entries of the global table for all classes in its constant pool and their
	/// outer classes, and for all classes directly inside it. A local entry is removed if it's already
	/// among these, and added otherwise. An empty local attribute means the class has no attribute.
	fn inner_classes(&self, this_class: CpRef, local: Option<&[LocalInnerClass]>, entries: &PoolCollector) -> Result<Option<Vec<InnerClass>>> {
		if local.is_some_and(|local| local.is_empty()) {
			return Ok(None);
		}
		let global = &self.bands.inner_classes;
		let by_inner: HashMap<CpRef, usize> = global.iter()
			.enumerate()
			.map(|(index, inner_class)| (inner_class.inner, index))
			.collect();

		let mut tuples: BTreeSet<usize> = global.iter()
			.enumerate()
			.filter(|(_, inner_class)| inner_class.outer == Some(this_class))
			.map(|(index, _)| index)
			.collect();
		for class in entries.classes() {
			let mut next = by_inner.get(&class);
			while let Some(&index) = next {
				if !tuples.insert(index) {
					break;
				}
				next = global[index].outer.and_then(|outer| by_inner.get(&outer));
			}
		}

		let mut explicit = Vec::new();
		for &tuple in local.unwrap_or_default() {
			let index = match tuple {
				LocalInnerClass::Global(inner) => match by_inner.get(&inner) {
					Some(&index) => index,
					None => bail!(DecodeError::format(format!("class {inner} isn't in the inner classes table"))),
				},
				LocalInnerClass::Explicit(inner_class) => match global.iter().position(|global| global == &inner_class) {
					Some(index) => index,
					None => {
						explicit.push(inner_class);
						continue;
					},
				},
			};
			if !tuples.remove(&index) {
				tuples.insert(index);
			}
		}

		let inner_classes: Vec<InnerClass> = tuples.into_iter()
			.map(|index| global[index])
			.chain(explicit)
			.collect();
		Ok(if inner_classes.is_empty() { None } else { Some(inner_classes) })
	}
}

fn local_variable(reader: &mut ValueReader) -> Result<LocalVariable> {
	Ok(LocalVariable {
		start: reader.u32()?,
		length: reader.u32()?,
		name: reader.required()?,
		descriptor: reader.required()?,
		index: reader.u16()?,
	})
}
