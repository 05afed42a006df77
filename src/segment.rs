//! Reading all bands of a segment.
//!
//! The bands are read in the order of [`crate::pipeline::STEPS`]. Reading resolves all references into
//! the constant pool, so that after this the constant pool is complete, and the classes can be put
//! together from the [`SegmentBands`] alone.

use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use log::{debug, warn};
use pack_coding::{BCI5, BRANCH5, BYTE1, DELTA5, MDELTA5, UNSIGNED5};
use crate::attribute::{read_attribute_group, AttributeContext, AttributeData, AttributeLayouts, LayoutKind, ObjectAttributes, Predefined};
use crate::attribute::layout::Value;
use crate::bytecode::OperandBands;
use crate::class::{FileContents, FileEntry};
use crate::cp::{read_constant_pool, ConstantPool, CpKind, CpRef};
use crate::descriptor::constant_kind;
use crate::DecodeError;
use crate::header::SegmentHeader;
use crate::ic::{read_inner_classes, InnerClass};
use crate::pipeline::{DecodeStep, Pipeline};
use crate::stream::{lengths, split, sum, BandReader};

/// The file option telling that the file is a class, whose contents are the next class of the segment.
const FILE_IS_CLASS_STUB: i64 = 1 << 1;
const FILE_DEFLATE_HINT: i64 = 1 << 0;

/// A field or a method.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MemberBands {
	/// The `Descr` entry with the name and the descriptor.
	pub(crate) descr: CpRef,
	pub(crate) attributes: ObjectAttributes,
	/// The index of the code of a method in [`SegmentBands::codes`].
	pub(crate) code: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassBands {
	pub(crate) this_class: CpRef,
	pub(crate) super_class: Option<CpRef>,
	pub(crate) interfaces: Vec<CpRef>,
	pub(crate) fields: Vec<MemberBands>,
	pub(crate) methods: Vec<MemberBands>,
	pub(crate) attributes: ObjectAttributes,
}

/// An exception handler with its offsets still as instruction indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawHandler {
	pub(crate) start: i64,
	/// The end, as the number of instructions after the start.
	pub(crate) end: i64,
	/// The handler, as the number of instructions after the end.
	pub(crate) catch: i64,
	pub(crate) class: Option<CpRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CodeBands {
	pub(crate) max_stack: u16,
	/// The locals not used by the arguments.
	pub(crate) max_na_locals: u16,
	pub(crate) handlers: Vec<RawHandler>,
	pub(crate) attributes: ObjectAttributes,
}

/// All bands of a segment.
#[derive(Debug)]
pub(crate) struct SegmentBands {
	pub(crate) header: SegmentHeader,
	pub(crate) pool: ConstantPool,
	pub(crate) layouts: AttributeLayouts,
	pub(crate) inner_classes: Vec<InnerClass>,
	/// The `Utf8` entry `InnerClasses`, present if there are any inner classes.
	pub(crate) inner_classes_name: Option<CpRef>,
	pub(crate) classes: Vec<ClassBands>,
	pub(crate) codes: Vec<CodeBands>,
	pub(crate) bytecodes: OperandBands,
	pub(crate) files: Vec<FileEntry>,
	/// The number of bytes of the input the segment takes up.
	pub(crate) bytes_consumed: usize,
}

impl SegmentBands {
	pub(crate) fn read(data: &[u8]) -> Result<SegmentBands> {
		let mut reader = BandReader::new(data);
		let mut pipeline = Pipeline::new();

		pipeline.begin(DecodeStep::Header, reader.position())?;
		let header = SegmentHeader::read(&mut reader)
			.with_context(|| anyhow!("failed to read segment header"))?;
		let band_headers = reader.bytes("band_headers", header.band_headers_size)?;
		reader.set_band_headers(band_headers);

		pipeline.begin(DecodeStep::ConstantPool, reader.position())?;
		let mut pool = read_constant_pool(&mut reader, &header.cp)
			.with_context(|| anyhow!("failed to read constant pool"))?;

		pipeline.begin(DecodeStep::AttributeDefinitions, reader.position())?;
		let layouts = AttributeLayouts::read(&mut reader, &pool, &header)
			.with_context(|| anyhow!("failed to read attribute definitions"))?;

		pipeline.begin(DecodeStep::InnerClasses, reader.position())?;
		let inner_classes = read_inner_classes(&mut reader, &mut pool, header.ic_count)
			.with_context(|| anyhow!("failed to read inner classes"))?;
		let inner_classes_name = (!inner_classes.is_empty())
			.then(|| pool.ensure_utf8(JavaStr::from_str("InnerClasses")));

		pipeline.begin(DecodeStep::Classes, reader.position())?;
		let shapes = read_classes(&mut reader, &pool, header.class_count)
			.with_context(|| anyhow!("failed to read classes"))?;

		pipeline.begin(DecodeStep::FieldAttributes, reader.position())?;
		let field_count = shapes.iter().map(|shape| shape.field_count).sum();
		let field_descrs = reader.band("field_descr", DELTA5, field_count)?;
		let field_descrs = field_descrs.into_iter()
			.map(|descr| pool.resolve(descr, CpKind::Descr))
			.collect::<Result<Vec<_>>>()?;
		let constant_kinds = field_descrs.iter()
			.map(|&descr| {
				let (_, descriptor) = pool.descr(descr)?;
				Ok(constant_kind(pool.text(descriptor)?))
			})
			.collect::<Result<Vec<_>>>()?;
		let field_attributes = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Field, field_count, &constant_kinds)
			.with_context(|| anyhow!("failed to read field attributes"))?;

		pipeline.begin(DecodeStep::MethodAttributes, reader.position())?;
		let method_count = shapes.iter().map(|shape| shape.method_count).sum();
		let method_descrs = reader.band("method_descr", MDELTA5, method_count)?;
		let method_descrs = method_descrs.into_iter()
			.map(|descr| pool.resolve(descr, CpKind::Descr))
			.collect::<Result<Vec<_>>>()?;
		let method_attributes = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Method, method_count, &[])
			.with_context(|| anyhow!("failed to read method attributes"))?;

		pipeline.begin(DecodeStep::ClassAttributes, reader.position())?;
		let mut class_attributes = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Class, header.class_count, &[])
			.with_context(|| anyhow!("failed to read class attributes"))?;
		predict_source_files(&mut pool, &layouts, &shapes, &mut class_attributes)?;

		pipeline.begin(DecodeStep::CodeHeaders, reader.position())?;
		let code_index = layouts.index_of(AttributeContext::Method, |kind| kind == &LayoutKind::Code);
		let code_count = match code_index {
			Some(index) => method_attributes.iter().filter(|method| method.find(index).is_some()).count(),
			None => 0,
		};
		let codes = read_code_headers(&mut reader, &mut pool, &layouts, &header, code_count)
			.with_context(|| anyhow!("failed to read code headers"))?;

		pipeline.begin(DecodeStep::Bytecodes, reader.position())?;
		let bytecodes = OperandBands::read(&mut reader, code_count)
			.with_context(|| anyhow!("failed to read byte codes"))?;

		pipeline.begin(DecodeStep::Files, reader.position())?;
		let classes = assemble_class_bands(shapes, field_descrs, field_attributes, method_descrs, method_attributes, class_attributes, code_index)?;
		let files = read_files(&mut reader, &pool, &header, &classes)
			.with_context(|| anyhow!("failed to read files"))?;

		pipeline.finish(reader.position())?;
		if header.archive_size != 0 && reader.remaining() != 0 {
			bail!(DecodeError::band_length("archive_size", format!("{} bytes of the segment are left over", reader.remaining())));
		}
		if reader.unused_band_headers() != 0 {
			warn!("{} bytes of band headers weren't used", reader.unused_band_headers());
		}

		let bytes_consumed = reader.position();
		debug!("read segment with {} classes and {} files in {bytes_consumed} bytes", classes.len(), files.len());
		Ok(SegmentBands { header, pool, layouts, inner_classes, inner_classes_name, classes, codes, bytecodes, files, bytes_consumed })
	}
}

/// The parts of a class read from the class bands.
struct ClassShape {
	this_class: CpRef,
	super_class: Option<CpRef>,
	interfaces: Vec<CpRef>,
	field_count: usize,
	method_count: usize,
}

fn read_classes(reader: &mut BandReader, pool: &ConstantPool, count: usize) -> Result<Vec<ClassShape>> {
	let this_class = reader.band("class_this", DELTA5, count)?;
	let super_class = reader.band("class_super", DELTA5, count)?;
	let interface_counts = reader.counts("class_interface_count", DELTA5, count)?;
	let interfaces = reader.band("class_interface", DELTA5, sum("class_interface_count", &interface_counts)?)?;
	let interfaces = split("class_interface", &interfaces, &interface_counts)?;
	let field_counts = reader.counts("class_field_count", DELTA5, count)?;
	let method_counts = reader.counts("class_method_count", DELTA5, count)?;

	this_class.into_iter()
		.zip(super_class)
		.zip(interfaces)
		.zip(field_counts.into_iter().zip(method_counts))
		.map(|(((this_value, super_value), interfaces), (field_count, method_count))| {
			Ok(ClassShape {
				this_class: pool.resolve(this_value, CpKind::Class)?,
				// a class that is its own super class has none
				super_class: if super_value == this_value {
					None
				} else {
					Some(pool.resolve(super_value, CpKind::Class)?)
				},
				interfaces: interfaces.into_iter()
					.map(|interface| pool.resolve(interface, CpKind::Class))
					.collect::<Result<_>>()?,
				field_count,
				method_count,
			})
		})
		.collect()
}

/// The source file of a class, if it isn't given otherwise: the outermost class name with `.java` added.
fn default_source_file(class_name: &JavaStr) -> JavaString {
	let simple = class_name.rsplit_once('/').map_or(class_name, |(_, simple)| simple);
	let outermost = simple.split_once('$').map_or(simple, |(outermost, _)| outermost);
	let mut source_file = outermost.to_owned();
	source_file.push_java_str(JavaStr::from_str(".java"));
	source_file
}

/// Fills in the `SourceFile` attributes without a value.
fn predict_source_files(pool: &mut ConstantPool, layouts: &AttributeLayouts, shapes: &[ClassShape], classes: &mut [ObjectAttributes]) -> Result<()> {
	let is_source_file = |kind: &LayoutKind| matches!(kind, LayoutKind::Generic { predefined: Some(Predefined::SourceFile), .. });
	let Some(index) = layouts.index_of(AttributeContext::Class, is_source_file) else {
		return Ok(());
	};
	for (shape, class) in shapes.iter().zip(classes) {
		for attribute in &mut class.attributes {
			if attribute.index != index {
				continue;
			}
			if let AttributeData::Values(values) = &mut attribute.data {
				if let [Value::Ref { entry: entry @ None, .. }] = values.as_mut_slice() {
					let source_file = default_source_file(pool.class_name(shape.this_class)?);
					*entry = Some(pool.ensure_utf8(&source_file));
				}
			}
		}
	}
	Ok(())
}

fn read_code_headers(
	reader: &mut BandReader,
	pool: &mut ConstantPool,
	layouts: &AttributeLayouts,
	header: &SegmentHeader,
	count: usize,
) -> Result<Vec<CodeBands>> {
	let headers = reader.band("code_headers", BYTE1, count)?;
	let long_count = headers.iter().filter(|&&header| header == 0).count();
	let max_stack = reader.band("code_max_stack", UNSIGNED5, long_count)?;
	let max_na_locals = reader.band("code_max_na_locals", UNSIGNED5, long_count)?;
	let handler_counts = reader.band("code_handler_count", UNSIGNED5, long_count)?;
	let handler_counts = lengths("code_handler_count", &handler_counts)?;

	// max stack, max locals without arguments, and number of handlers of each code
	let mut long = max_stack.into_iter().zip(max_na_locals).zip(handler_counts);
	let shapes = headers.iter()
		.map(|&code_header| {
			let code_header = code_header as u16;
			Ok(match code_header {
				0 => {
					let ((max_stack, max_na_locals), handlers) = long.next()
						.with_context(|| anyhow!("code_max_stack ran out of values"))?;
					let max_stack = u16::try_from(max_stack)
						.map_err(|_| anyhow!(DecodeError::format(format!("max stack {max_stack} is out of range"))))?;
					let max_na_locals = u16::try_from(max_na_locals)
						.map_err(|_| anyhow!(DecodeError::format(format!("max locals {max_na_locals} is out of range"))))?;
					(max_stack, max_na_locals, handlers)
				},
				1..=144 => ((code_header - 1) % 12, (code_header - 1) / 12, 0),
				145..=208 => ((code_header - 145) % 8, (code_header - 145) / 8, 1),
				_ => ((code_header - 209) % 7, (code_header - 209) / 7, 2),
			})
		})
		.collect::<Result<Vec<_>>>()?;

	let handler_counts: Vec<usize> = shapes.iter().map(|&(_, _, handlers)| handlers).collect();
	let total = sum("code_handler_count", &handler_counts)?;
	let starts = reader.band("code_handler_start_P", BCI5, total)?;
	let ends = reader.band("code_handler_end_PO", BRANCH5, total)?;
	let catches = reader.band("code_handler_catch_PO", BRANCH5, total)?;
	let classes = reader.band("code_handler_class_RCN", UNSIGNED5, total)?;
	let handlers = starts.into_iter()
		.zip(ends)
		.zip(catches)
		.zip(classes)
		.map(|(((start, end), catch), class)| Ok(RawHandler {
			start,
			end,
			catch,
			class: pool.resolve_nullable(class, CpKind::Class)?,
		}))
		.collect::<Result<Vec<_>>>()?;
	let handlers = split("code_handler_count", &handlers, &handler_counts)?;

	// without all code flags, only the codes with a long header have flags and attributes
	let all_code_flags = header.options.have_all_code_flags();
	let with_flags: Vec<bool> = headers.iter()
		.map(|&code_header| all_code_flags || code_header == 0)
		.collect();
	let with_flags_count = with_flags.iter().filter(|&&flags| flags).count();
	let mut attributes = read_attribute_group(reader, pool, layouts, header, AttributeContext::Code, with_flags_count, &[])?
		.into_iter();

	shapes.into_iter()
		.zip(handlers)
		.zip(with_flags)
		.map(|(((max_stack, max_na_locals, _), handlers), with_flags)| {
			let attributes = if with_flags {
				attributes.next()
					.with_context(|| anyhow!("code_flags_lo ran out of values"))?
			} else {
				ObjectAttributes::default()
			};
			Ok(CodeBands { max_stack, max_na_locals, handlers, attributes })
		})
		.collect()
}

/// Puts the parts of the classes read from the different bands together.
fn assemble_class_bands(
	shapes: Vec<ClassShape>,
	field_descrs: Vec<CpRef>,
	field_attributes: Vec<ObjectAttributes>,
	method_descrs: Vec<CpRef>,
	method_attributes: Vec<ObjectAttributes>,
	class_attributes: Vec<ObjectAttributes>,
	code_index: Option<usize>,
) -> Result<Vec<ClassBands>> {
	let mut fields = field_descrs.into_iter().zip(field_attributes);
	let mut methods = method_descrs.into_iter().zip(method_attributes);
	let mut next_code = 0;

	shapes.into_iter()
		.zip(class_attributes)
		.map(|(shape, attributes)| {
			let fields = fields.by_ref()
				.take(shape.field_count)
				.map(|(descr, attributes)| MemberBands { descr, attributes, code: None })
				.collect::<Vec<_>>();
			if fields.len() != shape.field_count {
				bail!(DecodeError::band_length("class_field_count", "more fields than field descriptors"));
			}
			let methods = methods.by_ref()
				.take(shape.method_count)
				.map(|(descr, attributes)| {
					let has_code = code_index.is_some_and(|index| attributes.find(index).is_some());
					let code = has_code.then(|| {
						next_code += 1;
						next_code - 1
					});
					MemberBands { descr, attributes, code }
				})
				.collect::<Vec<_>>();
			if methods.len() != shape.method_count {
				bail!(DecodeError::band_length("class_method_count", "more methods than method descriptors"));
			}
			Ok(ClassBands {
				this_class: shape.this_class,
				super_class: shape.super_class,
				interfaces: shape.interfaces,
				fields,
				methods,
				attributes,
			})
		})
		.collect()
}

fn read_files(reader: &mut BandReader, pool: &ConstantPool, header: &SegmentHeader, classes: &[ClassBands]) -> Result<Vec<FileEntry>> {
	let options = header.options;
	let count = header.file_count;

	let names = reader.band("file_name", UNSIGNED5, count)?;
	let size_hi = if options.have_file_size_hi() {
		reader.band("file_size_hi", UNSIGNED5, count)?
	} else {
		vec![0; count]
	};
	let size_lo = reader.band("file_size_lo", UNSIGNED5, count)?;
	let modtimes = if options.have_file_modtime() {
		reader.band("file_modtime", DELTA5, count)?
	} else {
		vec![0; count]
	};
	let file_options = if options.have_file_options() {
		reader.band("file_options", UNSIGNED5, count)?
	} else {
		vec![0; count]
	};

	let sizes = size_hi.into_iter()
		.zip(size_lo)
		.map(|(hi, lo)| {
			let size = (hi as u64) << 32 | lo as u32 as u64;
			usize::try_from(size)
				.map_err(|_| anyhow!(DecodeError::band_length("file_size_lo", format!("file size {size} doesn't fit into memory"))))
		})
		.collect::<Result<Vec<_>>>()?;

	let class_file_name = |class: &ClassBands| -> Result<JavaString> {
		let mut name = pool.class_name(class.this_class)?.to_owned();
		name.push_java_str(JavaStr::from_str(".class"));
		Ok(name)
	};
	let segment_deflate_hint = options.deflate_hint();

	let mut next_class = 0;
	let mut files = Vec::with_capacity(count);
	for (((name, size), modtime), file_options) in names.into_iter().zip(sizes).zip(modtimes).zip(file_options) {
		let name = pool.utf8(pool.resolve(name, CpKind::Utf8)?)?;
		let bytes = reader.bytes("file_bits", size)?;
		let modtime = header.archive_modtime + modtime;
		let deflate_hint = segment_deflate_hint || file_options & FILE_DEFLATE_HINT != 0;

		let (name, contents) = if file_options & FILE_IS_CLASS_STUB != 0 {
			let Some(class) = classes.get(next_class) else {
				bail!(DecodeError::format(format!("file {name:?} is a class, but all {} classes are used up", classes.len())));
			};
			let name = if name.is_empty() { class_file_name(class)? } else { name.to_owned() };
			next_class += 1;
			(name, FileContents::Class(next_class - 1))
		} else {
			(name.to_owned(), FileContents::Bytes(bytes.to_vec()))
		};
		files.push(FileEntry { name, modtime, deflate_hint, contents });
	}

	for (index, class) in classes.iter().enumerate().skip(next_class) {
		files.push(FileEntry {
			name: class_file_name(class)?,
			modtime: header.archive_modtime,
			deflate_hint: segment_deflate_hint,
			contents: FileContents::Class(index),
		});
	}
	Ok(files)
}
