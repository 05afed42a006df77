use anyhow::Result;
use java_string::JavaString;
use pack_coding::{BCI5, BRANCH5, BYTE1, DELTA5, MDELTA5, UDELTA5, UNSIGNED5};
use pretty_assertions::assert_eq;
use raw_segment::{options, utf8_bands, ArchiveHeader, Band, CpCounts, Segment};
use unpack200::bytecode::{insn, Instruction, Op};
use unpack200::class::{ExceptionHandler, FileContents, FileEntry, LineNumber, Version};
use unpack200::cp::{ConstantPool, CpEntry, CpKind, CpRef};
use unpack200::metadata::{Annotation, ElementValue, ElementValuePair};
use unpack200::DecodeError;

/// Gives a readable form of a constant pool entry.
fn describe(pool: &ConstantPool, cp: CpRef) -> Result<String> {
	Ok(match pool.get(cp)? {
		CpEntry::Utf8(string) => string.to_string(),
		CpEntry::Int(value) => format!("int {value}"),
		CpEntry::Class(name) => format!("class {}", pool.utf8(*name)?),
		CpEntry::Signature { text, .. } => format!("signature {text}"),
		entry => format!("{entry:?}"),
	})
}

fn describe_all(pool: &ConstantPool, entries: impl IntoIterator<Item = CpRef>) -> Result<Vec<String>> {
	entries.into_iter().map(|cp| describe(pool, cp)).collect()
}

/// A class `Foo` with a static method `m()V` that has a short code header.
fn minimal_bands() -> Vec<Band> {
	let mut bands = utf8_bands(&["", "Foo", "java/lang/Object", "m", "()V"]);
	bands.extend([
		Band::new("cp_Class", UDELTA5, vec![1, 2]),
		Band::new("cp_Signature_form", DELTA5, vec![4]),
		Band::new("cp_Descr_name", DELTA5, vec![3]),
		Band::new("cp_Descr_type", UDELTA5, vec![0]),
		Band::new("class_this", DELTA5, vec![0]),
		Band::new("class_super", DELTA5, vec![1]),
		Band::new("class_interface_count", DELTA5, vec![0]),
		Band::new("class_field_count", DELTA5, vec![0]),
		Band::new("class_method_count", DELTA5, vec![1]),
		Band::new("method_descr", MDELTA5, vec![0]),
		// static, with code
		Band::new("method_flags_lo", UNSIGNED5, vec![0x2_0008]),
		Band::new("class_flags_lo", UNSIGNED5, vec![0x21]),
		Band::new("code_headers", BYTE1, vec![2]),
		Band::bytes("bc_codes", vec![insn::iconst_0, insn::ifeq, insn::iconst_1, insn::r#return, 0xff]),
		Band::new("bc_label", BRANCH5, vec![2]),
	]);
	bands
}

fn minimal() -> Segment {
	Segment {
		cp: CpCounts { utf8: 5, class: 2, signature: 1, descr: 1, ..CpCounts::default() },
		class_count: 1,
		bands: minimal_bands(),
		..Segment::default()
	}
}

#[test]
fn minimal_class() -> Result<()> {
	let bytes = minimal().to_bytes();
	let segment = unpack200::decode_segment(&bytes)?;

	assert_eq!(segment.bytes_consumed, bytes.len());
	assert_eq!(segment.classes.len(), 1);
	let class = &segment.classes[0];
	assert_eq!(class.version, Version { major: 49, minor: 0 });
	assert_eq!(class.access, 0x21);
	assert_eq!(describe(&segment.pool, class.this_class)?, "class Foo");
	assert_eq!(class.super_class, Some(segment.pool.resolve(1, CpKind::Class)?));
	assert_eq!(class.fields, vec![]);
	assert_eq!(class.inner_classes, None);

	let method = &class.methods[0];
	assert_eq!(method.access, 0x8);
	assert_eq!(describe(&segment.pool, method.name)?, "m");
	let code = method.code.as_ref().unwrap();
	assert_eq!((code.max_stack, code.max_locals), (1, 0));
	assert_eq!(code.code_length, 6);
	assert_eq!(code.instructions, vec![
		Instruction { offset: 0, op: Op::Simple(insn::iconst_0) },
		Instruction { offset: 1, op: Op::Branch { opcode: insn::ifeq, delta: 4 } },
		Instruction { offset: 4, op: Op::Simple(insn::iconst_1) },
		Instruction { offset: 5, op: Op::Simple(insn::r#return) },
	]);
	assert_eq!(code.exception_table, vec![]);
	assert_eq!(code.line_numbers, None);

	assert_eq!(describe_all(&segment.pool, class.pool.iter().copied())?, vec![
		"Foo",
		"java/lang/Object",
		"m",
		"Code",
		"class Foo",
		"class java/lang/Object",
		"signature ()V",
	]);

	assert_eq!(segment.files, vec![FileEntry {
		name: JavaString::from("Foo.class"),
		modtime: 0,
		deflate_hint: false,
		contents: FileContents::Class(0),
	}]);
	Ok(())
}

/// A class `Foo` with a constant field `X`, an enum annotation, and a static method `m(I)I` with a
/// switch, an exception handler and line numbers.
#[test]
fn switch_handler_and_annotation() -> Result<()> {
	let mut bands = utf8_bands(&["", "Foo", "java/lang/Object", "m", "(I)I", "X", "I", "Color", "L;", "color", "RED"]);
	bands.extend([
		Band::new("cp_Int", UDELTA5, vec![42]),
		Band::new("cp_Class", UDELTA5, vec![1, 2, 7]),
		Band::new("cp_Signature_form", DELTA5, vec![4, 6, 8]),
		Band::new("cp_Signature_classes", UDELTA5, vec![2]),
		Band::new("cp_Descr_name", DELTA5, vec![3, 5]),
		Band::new("cp_Descr_type", UDELTA5, vec![0, 1]),

		Band::new("class_this", DELTA5, vec![0]),
		Band::new("class_super", DELTA5, vec![1]),
		Band::new("class_interface_count", DELTA5, vec![0]),
		Band::new("class_field_count", DELTA5, vec![1]),
		Band::new("class_method_count", DELTA5, vec![1]),

		Band::new("field_descr", DELTA5, vec![1]),
		// static final, with a constant value
		Band::new("field_flags_lo", UNSIGNED5, vec![0x2_0018]),
		Band::new("field_ConstantValue_KQ", UNSIGNED5, vec![0]),

		Band::new("method_descr", MDELTA5, vec![0]),
		Band::new("method_flags_lo", UNSIGNED5, vec![0x2_0008]),

		// with runtime visible annotations
		Band::new("class_flags_lo", UNSIGNED5, vec![0x20_0021]),
		Band::new("class_attr_calls", UNSIGNED5, vec![0]),
		Band::new("class_RVA_anno_N", UNSIGNED5, vec![1]),
		Band::new("class_RVA_type_RS", UNSIGNED5, vec![2]),
		Band::new("class_RVA_pair_N", UNSIGNED5, vec![1]),
		Band::new("class_RVA_name_RU", UNSIGNED5, vec![9]),
		Band::new("class_RVA_T", BYTE1, vec![b'e' as i64]),
		Band::new("class_RVA_caseet_RS", UNSIGNED5, vec![2]),
		Band::new("class_RVA_caseec_RU", UNSIGNED5, vec![10]),

		// a long header, with one handler
		Band::new("code_headers", BYTE1, vec![0]),
		Band::new("code_max_stack", UNSIGNED5, vec![1]),
		Band::new("code_max_na_locals", UNSIGNED5, vec![0]),
		Band::new("code_handler_count", UNSIGNED5, vec![1]),
		Band::new("code_handler_start_P", BCI5, vec![0]),
		Band::new("code_handler_end_PO", BRANCH5, vec![2]),
		Band::new("code_handler_catch_PO", BRANCH5, vec![2]),
		Band::new("code_handler_class_RCN", UNSIGNED5, vec![0]),
		// with a line number table
		Band::new("code_flags_lo", UNSIGNED5, vec![0x2]),
		Band::new("code_LineNumberTable_N", UNSIGNED5, vec![2]),
		Band::new("code_LineNumberTable_bci_P", BCI5, vec![0, 4]),
		Band::new("code_LineNumberTable_line", UNSIGNED5, vec![10, 12]),

		Band::bytes("bc_codes", vec![
			insn::iload, insn::tableswitch,
			insn::iconst_1, insn::ireturn,
			insn::iconst_0, insn::ireturn,
			0xff,
		]),
		Band::new("bc_case_count", UNSIGNED5, vec![1]),
		Band::new("bc_case_value", DELTA5, vec![0]),
		Band::new("bc_local", UNSIGNED5, vec![0]),
		// the default goes to `iconst_0`, the only case to `iconst_1`
		Band::new("bc_label", BRANCH5, vec![3, 1]),
	]);
	let bytes = Segment {
		options: options::HAVE_CP_NUMBERS,
		cp: CpCounts { utf8: 11, int: 1, class: 3, signature: 3, descr: 2, ..CpCounts::default() },
		class_count: 1,
		bands,
		..Segment::default()
	}.to_bytes();

	let segment = unpack200::decode_segment(&bytes)?;
	let pool = &segment.pool;
	let class = &segment.classes[0];

	let field = &class.fields[0];
	assert_eq!(field.access, 0x18);
	assert_eq!(describe(pool, field.name)?, "X");
	assert_eq!(describe(pool, field.descriptor)?, "signature I");
	assert_eq!(field.constant_value, Some(pool.resolve(0, CpKind::Int)?));

	let code = class.methods[0].code.as_ref().unwrap();
	assert_eq!((code.max_stack, code.max_locals), (1, 1));
	assert_eq!(code.instructions, vec![
		Instruction { offset: 0, op: Op::Local { opcode: insn::iload, index: 0, wide: false } },
		// one byte of padding
		Instruction { offset: 2, op: Op::TableSwitch { default: 20, low: 0, deltas: vec![18] } },
		Instruction { offset: 20, op: Op::Simple(insn::iconst_1) },
		Instruction { offset: 21, op: Op::Simple(insn::ireturn) },
		Instruction { offset: 22, op: Op::Simple(insn::iconst_0) },
		Instruction { offset: 23, op: Op::Simple(insn::ireturn) },
	]);
	assert_eq!(code.code_length, 24);
	assert_eq!(code.exception_table, vec![ExceptionHandler { start: 0, end: 20, handler: 22, catch: None }]);
	assert_eq!(code.line_numbers, Some(vec![
		LineNumber { start: 0, line: 10 },
		LineNumber { start: 22, line: 12 },
	]));

	let color = pool.resolve(2, CpKind::Signature)?;
	assert_eq!(describe(pool, color)?, "signature LColor;");
	assert_eq!(class.runtime_visible_annotations, vec![Annotation {
		type_descriptor: color,
		pairs: vec![ElementValuePair {
			name: pool.resolve(9, CpKind::Utf8)?,
			value: ElementValue::Enum { type_descriptor: color, const_name: pool.resolve(10, CpKind::Utf8)? },
		}],
	}]);

	// the class `Color` is only part of a signature, so it isn't in the class file
	assert_eq!(describe_all(pool, class.pool.iter().copied())?, vec![
		"Foo",
		"java/lang/Object",
		"m",
		"X",
		"color",
		"RED",
		"ConstantValue",
		"Code",
		"RuntimeVisibleAnnotations",
		"LineNumberTable",
		"int 42",
		"class Foo",
		"class java/lang/Object",
		"signature (I)I",
		"signature I",
		"signature LColor;",
	]);
	Ok(())
}

#[test]
fn escaped_band() -> Result<()> {
	let mut segment = minimal();
	for band in &mut segment.bands {
		if let Band::Values { name: "cp_Class", values, .. } = band {
			*band = Band::Escaped { name: "cp_Class", default: UDELTA5, coding: BYTE1, values: values.clone() };
		}
	}
	let escaped = unpack200::decode_segment(&segment.to_bytes())?;
	let plain = unpack200::decode_segment(&minimal().to_bytes())?;

	assert_eq!(escaped.classes, plain.classes);
	assert_eq!(escaped.files, plain.files);
	Ok(())
}

#[test]
fn unresolved_class() -> Result<()> {
	let mut segment = minimal();
	for band in &mut segment.bands {
		if let Band::Values { name: "class_this", values, .. } = band {
			// one past the last class entry
			*values = vec![2];
		}
	}
	let error = unpack200::decode_segment(&segment.to_bytes()).unwrap_err();
	assert!(
		matches!(DecodeError::find(&error), Some(DecodeError::UnresolvedReference { index: 2, .. })),
		"{error:?}",
	);
	Ok(())
}

#[test]
fn truncated_band() -> Result<()> {
	let header_only = Segment { bands: Vec::new(), ..minimal() }.to_bytes();
	let bytes = minimal().to_bytes();

	// only the first of the three values of cp_Utf8_prefix is left
	let error = unpack200::decode_segment(&bytes[..header_only.len() + 1]).unwrap_err();
	assert!(
		matches!(DecodeError::find(&error), Some(DecodeError::MalformedCodec { band, .. }) if band == "cp_Utf8_prefix"),
		"{error:?}",
	);
	Ok(())
}

#[test]
fn files_with_headers() -> Result<()> {
	let mut bands = utf8_bands(&["", "META-INF/MANIFEST.MF"]);
	bands.extend([
		Band::new("file_name", UNSIGNED5, vec![1]),
		Band::new("file_size_lo", UNSIGNED5, vec![3]),
		Band::new("file_modtime", DELTA5, vec![5]),
		// deflate
		Band::new("file_options", UNSIGNED5, vec![1]),
		Band::bytes("file_bits", vec![1, 2, 3]),
	]);
	let bytes = Segment {
		options: options::HAVE_FILE_HEADERS | options::HAVE_FILE_MODTIME | options::HAVE_FILE_OPTIONS,
		archive: ArchiveHeader { modtime: 1000, file_count: 1, ..ArchiveHeader::default() },
		cp: CpCounts { utf8: 2, ..CpCounts::default() },
		bands,
		..Segment::default()
	}.to_bytes();

	let segment = unpack200::decode_segment(&bytes)?;
	assert_eq!(segment.bytes_consumed, bytes.len());
	assert_eq!(segment.header.file_count, 1);
	assert_eq!(segment.classes, vec![]);
	assert_eq!(segment.files, vec![FileEntry {
		name: JavaString::from("META-INF/MANIFEST.MF"),
		modtime: 1005,
		deflate_hint: true,
		contents: FileContents::Bytes(vec![1, 2, 3]),
	}]);
	Ok(())
}

#[test]
fn two_segments() -> Result<()> {
	let first = minimal().to_bytes();
	let second = Segment { major_version: 160, ..minimal() }.to_bytes();
	let mut data = first.clone();
	data.extend(&second);

	let segments = unpack200::decode_archive(&data)?;
	assert_eq!(segments.len(), 2);
	assert_eq!(segments[0].bytes_consumed, first.len());
	assert_eq!(segments[1].bytes_consumed, second.len());
	assert_eq!(segments[1].header.major_version, 160);
	assert_eq!(segments[0].classes, segments[1].classes);
	Ok(())
}
