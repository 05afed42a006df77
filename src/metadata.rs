//! Annotations.
//!
//! All annotations of one kind in one context are stored together, flattened into bands that are
//! consumed depth first. Each band is read into a [`Cursor`], and all cursors of a group are passed
//! down while rebuilding the annotation trees.

use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use pack_coding::{BYTE1, UNSIGNED5};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::DecodeError;
use crate::stream::{lengths, sum, BandReader};

/// The kinds of annotation attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
	Visible,
	Invisible,
	VisibleParameter,
	InvisibleParameter,
	AnnotationDefault,
}

impl MetadataKind {
	fn band_prefix(self) -> &'static str {
		match self {
			MetadataKind::Visible => "RVA",
			MetadataKind::Invisible => "RIA",
			MetadataKind::VisibleParameter => "RVPA",
			MetadataKind::InvisibleParameter => "RIPA",
			MetadataKind::AnnotationDefault => "AD",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	/// The `Signature` entry of the type of the annotation.
	pub type_descriptor: CpRef,
	pub pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
	/// The `Utf8` entry of the name of the element.
	pub name: CpRef,
	pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
	/// A constant, with its tag being one of `BCDFIJSZs`.
	Const { tag: u8, value: CpRef },
	/// An enum constant, given as the type and the name of the constant.
	Enum { type_descriptor: CpRef, const_name: CpRef },
	/// A class literal, given by its return descriptor.
	Class(CpRef),
	Annotation(Annotation),
	Array(Vec<ElementValue>),
}

/// The contents of an annotation attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
	Annotations(Vec<Annotation>),
	ParameterAnnotations(Vec<Vec<Annotation>>),
	AnnotationDefault(ElementValue),
}

/// The values of one band, consumed in order.
#[derive(Debug)]
struct Cursor<T> {
	band: String,
	values: Vec<T>,
	position: usize,
}

impl<T: Copy> Cursor<T> {
	fn new(band: String, values: Vec<T>) -> Cursor<T> {
		Cursor { band, values, position: 0 }
	}

	fn next(&mut self) -> Result<T> {
		let Some(&value) = self.values.get(self.position) else {
			bail!(DecodeError::MetadataCursorExhaustion { band: self.band.clone(), needed: self.position + 1 });
		};
		self.position += 1;
		Ok(value)
	}

	fn finish(&self) -> Result<()> {
		if self.position != self.values.len() {
			bail!(DecodeError::band_length(&self.band, format!(
				"{} values were left over after rebuilding the annotations", self.values.len() - self.position,
			)));
		}
		Ok(())
	}
}

/// The cursors over all bands of one group of annotation attributes.
struct MetadataCursors {
	param_nb: Cursor<usize>,
	anno_n: Cursor<usize>,
	type_rs: Cursor<CpRef>,
	pair_n: Cursor<usize>,
	name_ru: Cursor<CpRef>,
	t: Cursor<u8>,
	case_i: Cursor<CpRef>,
	case_d: Cursor<CpRef>,
	case_f: Cursor<CpRef>,
	case_j: Cursor<CpRef>,
	case_c: Cursor<CpRef>,
	case_et: Cursor<CpRef>,
	case_ec: Cursor<CpRef>,
	case_s: Cursor<CpRef>,
	case_array: Cursor<usize>,
	nest_type: Cursor<CpRef>,
	nest_pair: Cursor<usize>,
	nest_name: Cursor<CpRef>,
}

struct BandNames {
	prefix: String,
}

impl BandNames {
	fn get(&self, band: &str) -> String {
		format!("{}_{band}", self.prefix)
	}

	/// A cursor for a band that isn't used by a kind of annotations.
	fn empty<T: Copy>(&self, band: &str) -> Cursor<T> {
		Cursor::new(self.get(band), Vec::new())
	}
}

fn read_refs(reader: &mut BandReader, pool: &ConstantPool, name: String, count: usize, kind: CpKind) -> Result<Cursor<CpRef>> {
	let refs = reader.band(&name, UNSIGNED5, count)?
		.into_iter()
		.map(|index| pool.resolve(index, kind))
		.collect::<Result<Vec<_>>>()
		.with_context(|| anyhow!("in band {name}"))?;
	Ok(Cursor::new(name, refs))
}

fn read_counts(reader: &mut BandReader, name: String, count: usize) -> Result<Cursor<usize>> {
	let values = reader.band(&name, UNSIGNED5, count)?;
	let values = lengths(&name, &values)?;
	Ok(Cursor::new(name, values))
}

impl MetadataCursors {
	fn read(reader: &mut BandReader, pool: &ConstantPool, names: &BandNames, kind: MetadataKind, count: usize, backward_calls: usize) -> Result<MetadataCursors> {
		let (param_nb, annotation_count) = match kind {
			MetadataKind::VisibleParameter | MetadataKind::InvisibleParameter => {
				let name = names.get("param_NB");
				let values = reader.band(&name, BYTE1, count)?;
				let values = lengths(&name, &values)?;
				let total = sum(&name, &values)?;
				(Cursor::new(name, values), total)
			},
			MetadataKind::Visible | MetadataKind::Invisible => (names.empty("param_NB"), count),
			MetadataKind::AnnotationDefault => (names.empty("param_NB"), 0),
		};

		let (anno_n, type_rs, pair_n, name_ru, top_level_values) = if kind == MetadataKind::AnnotationDefault {
			(names.empty("anno_N"), names.empty("type_RS"), names.empty("pair_N"), names.empty("name_RU"), count)
		} else {
			let anno_n = read_counts(reader, names.get("anno_N"), annotation_count)?;
			let annotations = sum(&anno_n.band, &anno_n.values)?;
			let type_rs = read_refs(reader, pool, names.get("type_RS"), annotations, CpKind::Signature)?;
			let pair_n = read_counts(reader, names.get("pair_N"), annotations)?;
			let pairs = sum(&pair_n.band, &pair_n.values)?;
			let name_ru = read_refs(reader, pool, names.get("name_RU"), pairs, CpKind::Utf8)?;
			(anno_n, type_rs, pair_n, name_ru, pairs)
		};

		let t_name = names.get("T");
		let tags: Vec<u8> = reader.band(&t_name, BYTE1, top_level_values + backward_calls)?
			.into_iter()
			.map(|tag| u8::try_from(tag).map_err(|_| anyhow!(DecodeError::format(format!("annotation tag {tag} out of range")))))
			.collect::<Result<_>>()?;
		let tagged = |tags_of: &[u8]| tags.iter().filter(|&&tag| tags_of.contains(&tag)).count();

		let case_i = read_refs(reader, pool, names.get("caseI_KI"), tagged(b"BCISZ"), CpKind::Int)?;
		let case_d = read_refs(reader, pool, names.get("caseD_KD"), tagged(b"D"), CpKind::Double)?;
		let case_f = read_refs(reader, pool, names.get("caseF_KF"), tagged(b"F"), CpKind::Float)?;
		let case_j = read_refs(reader, pool, names.get("caseJ_KJ"), tagged(b"J"), CpKind::Long)?;
		let case_c = read_refs(reader, pool, names.get("casec_RS"), tagged(b"c"), CpKind::Signature)?;
		let case_et = read_refs(reader, pool, names.get("caseet_RS"), tagged(b"e"), CpKind::Signature)?;
		let case_ec = read_refs(reader, pool, names.get("caseec_RU"), tagged(b"e"), CpKind::Utf8)?;
		let case_s = read_refs(reader, pool, names.get("cases_RU"), tagged(b"s"), CpKind::Utf8)?;
		let case_array = read_counts(reader, names.get("casearray_N"), tagged(b"["))?;
		let nest_type = read_refs(reader, pool, names.get("nesttype_RS"), tagged(b"@"), CpKind::Signature)?;
		let nest_pair = read_counts(reader, names.get("nestpair_N"), tagged(b"@"))?;
		let nest_pairs = sum(&nest_pair.band, &nest_pair.values)?;
		let nest_name = read_refs(reader, pool, names.get("nestname_RU"), nest_pairs, CpKind::Utf8)?;

		Ok(MetadataCursors {
			param_nb,
			anno_n,
			type_rs,
			pair_n,
			name_ru,
			t: Cursor::new(t_name, tags),
			case_i,
			case_d,
			case_f,
			case_j,
			case_c,
			case_et,
			case_ec,
			case_s,
			case_array,
			nest_type,
			nest_pair,
			nest_name,
		})
	}

	fn annotations(&mut self) -> Result<Vec<Annotation>> {
		let count = self.anno_n.next()?;
		(0..count).map(|_| self.annotation()).collect()
	}

	fn annotation(&mut self) -> Result<Annotation> {
		let type_descriptor = self.type_rs.next()?;
		let pairs = self.pair_n.next()?;
		let pairs = (0..pairs)
			.map(|_| {
				let name = self.name_ru.next()?;
				Ok(ElementValuePair { name, value: self.value()? })
			})
			.collect::<Result<_>>()?;
		Ok(Annotation { type_descriptor, pairs })
	}

	fn nested_annotation(&mut self) -> Result<Annotation> {
		let type_descriptor = self.nest_type.next()?;
		let pairs = self.nest_pair.next()?;
		let pairs = (0..pairs)
			.map(|_| {
				let name = self.nest_name.next()?;
				Ok(ElementValuePair { name, value: self.value()? })
			})
			.collect::<Result<_>>()?;
		Ok(Annotation { type_descriptor, pairs })
	}

	fn value(&mut self) -> Result<ElementValue> {
		let tag = self.t.next()?;
		Ok(match tag {
			b'B' | b'C' | b'I' | b'S' | b'Z' => ElementValue::Const { tag, value: self.case_i.next()? },
			b'D' => ElementValue::Const { tag, value: self.case_d.next()? },
			b'F' => ElementValue::Const { tag, value: self.case_f.next()? },
			b'J' => ElementValue::Const { tag, value: self.case_j.next()? },
			b's' => ElementValue::Const { tag, value: self.case_s.next()? },
			b'c' => ElementValue::Class(self.case_c.next()?),
			b'e' => ElementValue::Enum {
				type_descriptor: self.case_et.next()?,
				const_name: self.case_ec.next()?,
			},
			b'[' => {
				let count = self.case_array.next()?;
				ElementValue::Array((0..count).map(|_| self.value()).collect::<Result<_>>()?)
			},
			b'@' => ElementValue::Annotation(self.nested_annotation()?),
			_ => bail!(DecodeError::format(format!("unknown annotation element tag {:?}", tag as char))),
		})
	}

	fn finish(&self) -> Result<()> {
		for counts in [&self.param_nb, &self.anno_n, &self.pair_n, &self.case_array, &self.nest_pair] {
			counts.finish()?;
		}
		for refs in [
			&self.type_rs, &self.name_ru, &self.case_i, &self.case_d, &self.case_f, &self.case_j, &self.case_c,
			&self.case_et, &self.case_ec, &self.case_s, &self.nest_type, &self.nest_name,
		] {
			refs.finish()?;
		}
		self.t.finish()
	}
}

/// Reads the bands of `count` annotation attributes of one kind, and rebuilds their contents.
///
/// `backward_calls` is the number of values that are elements of arrays or of nested annotations.
pub(crate) fn read_metadata(
	reader: &mut BandReader,
	pool: &ConstantPool,
	context: &str,
	kind: MetadataKind,
	count: usize,
	backward_calls: usize,
) -> Result<Vec<Metadata>> {
	let names = BandNames { prefix: format!("{context}_{}", kind.band_prefix()) };
	let mut cursors = MetadataCursors::read(reader, pool, &names, kind, count, backward_calls)?;

	let mut attributes = Vec::with_capacity(count);
	for _ in 0..count {
		let metadata = match kind {
			MetadataKind::Visible | MetadataKind::Invisible => Metadata::Annotations(cursors.annotations()?),
			MetadataKind::VisibleParameter | MetadataKind::InvisibleParameter => {
				let parameters = cursors.param_nb.next()?;
				Metadata::ParameterAnnotations((0..parameters).map(|_| cursors.annotations()).collect::<Result<_>>()?)
			},
			MetadataKind::AnnotationDefault => Metadata::AnnotationDefault(cursors.value()?),
		};
		attributes.push(metadata);
	}
	cursors.finish()?;
	trace!("rebuilt {count} {} attributes", names.prefix);
	Ok(attributes)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pack_coding::{Bhsd, BYTE1, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::cp::{CpEntry, CpKind};
	use crate::cp::testing::cp;
	use crate::DecodeError;
	use crate::metadata::{read_metadata, Annotation, ElementValue, ElementValuePair, Metadata, MetadataKind};
	use crate::stream::BandReader;

	fn encode(bands: &[(Bhsd, &[i64])]) -> Vec<u8> {
		let mut out = Vec::new();
		for (coding, values) in bands {
			coding.encode_values(values, &mut out).unwrap();
		}
		out
	}

	fn pool() -> Result<crate::cp::ConstantPool> {
		let utf8 = |s: &str| CpEntry::Utf8(JavaStr::from_str(s).to_owned());
		let signature = |form: usize, s: &str| CpEntry::Signature {
			form: cp(CpKind::Utf8, form),
			classes: Vec::new(),
			text: JavaStr::from_str(s).to_owned(),
		};
		crate::cp::testing::pool(vec![
			utf8(""), utf8("LA;"), utf8("LB;"), utf8("value"), utf8("other"), utf8("RED"),
			CpEntry::Int(1), CpEntry::Int(2),
			signature(1, "LA;"), signature(2, "LB;"),
		])
	}

	#[test]
	fn array_of_nested_annotations() -> Result<()> {
		let pool = pool()?;
		let tags: Vec<i64> = "[@II@II@II".bytes().map(i64::from).collect();
		let data = encode(&[
			// anno_N, type_RS, pair_N, name_RU
			(UNSIGNED5, &[1]),
			(UNSIGNED5, &[0]),
			(UNSIGNED5, &[1]),
			(UNSIGNED5, &[3]),
			// T: the array, then three annotations with two int values each
			(BYTE1, &tags),
			// caseI_KI
			(UNSIGNED5, &[0, 1, 0, 1, 0, 1]),
			// casearray_N
			(UNSIGNED5, &[3]),
			// nesttype_RS, nestpair_N, nestname_RU
			(UNSIGNED5, &[1, 1, 1]),
			(UNSIGNED5, &[2, 2, 2]),
			(UNSIGNED5, &[3, 4, 3, 4, 3, 4]),
		]);
		let mut reader = BandReader::new(&data);
		// one array with three elements, each with two pairs
		let attributes = read_metadata(&mut reader, &pool, "class", MetadataKind::Visible, 1, 3 + 6)?;
		assert_eq!(reader.remaining(), 0);

		let nested = Annotation {
			type_descriptor: cp(CpKind::Signature, 1),
			pairs: vec![
				ElementValuePair { name: cp(CpKind::Utf8, 3), value: ElementValue::Const { tag: b'I', value: cp(CpKind::Int, 0) } },
				ElementValuePair { name: cp(CpKind::Utf8, 4), value: ElementValue::Const { tag: b'I', value: cp(CpKind::Int, 1) } },
			],
		};
		assert_eq!(attributes, vec![Metadata::Annotations(vec![Annotation {
			type_descriptor: cp(CpKind::Signature, 0),
			pairs: vec![ElementValuePair {
				name: cp(CpKind::Utf8, 3),
				value: ElementValue::Array(vec![
					ElementValue::Annotation(nested.clone()),
					ElementValue::Annotation(nested.clone()),
					ElementValue::Annotation(nested),
				]),
			}],
		}])]);
		Ok(())
	}

	#[test]
	fn enum_keeps_type_and_name_apart() -> Result<()> {
		let pool = pool()?;
		let data = encode(&[
			// T
			(BYTE1, &[b'e' as i64]),
			// caseet_RS, caseec_RU
			(UNSIGNED5, &[1]),
			(UNSIGNED5, &[5]),
		]);
		let mut reader = BandReader::new(&data);
		let attributes = read_metadata(&mut reader, &pool, "method", MetadataKind::AnnotationDefault, 1, 0)?;
		assert_eq!(attributes, vec![Metadata::AnnotationDefault(ElementValue::Enum {
			type_descriptor: cp(CpKind::Signature, 1),
			const_name: cp(CpKind::Utf8, 5),
		})]);
		assert_eq!(pool.text(cp(CpKind::Signature, 1))?, JavaStr::from_str("LB;"));
		Ok(())
	}

	#[test]
	fn parameter_annotations() -> Result<()> {
		let pool = pool()?;
		let data = encode(&[
			// param_NB: two parameters
			(BYTE1, &[2]),
			// anno_N: none on the first, one on the second
			(UNSIGNED5, &[0, 1]),
			(UNSIGNED5, &[0]),
			(UNSIGNED5, &[0]),
		]);
		let mut reader = BandReader::new(&data);
		let attributes = read_metadata(&mut reader, &pool, "method", MetadataKind::InvisibleParameter, 1, 0)?;
		assert_eq!(reader.remaining(), 0);
		assert_eq!(attributes, vec![Metadata::ParameterAnnotations(vec![
			vec![],
			vec![Annotation { type_descriptor: cp(CpKind::Signature, 0), pairs: vec![] }],
		])]);
		Ok(())
	}

	#[test]
	fn exhausted_cursor() -> Result<()> {
		let pool = pool()?;
		// the array claims two elements, but there's only one backward call
		let data = encode(&[
			(BYTE1, &[b'[' as i64, b's' as i64]),
			(UNSIGNED5, &[3]),
			(UNSIGNED5, &[2]),
		]);
		let mut reader = BandReader::new(&data);
		let error = read_metadata(&mut reader, &pool, "method", MetadataKind::AnnotationDefault, 1, 1).unwrap_err();
		assert_eq!(
			DecodeError::find(&error),
			Some(&DecodeError::MetadataCursorExhaustion { band: "method_AD_T".to_owned(), needed: 3 }),
		);
		Ok(())
	}
}
