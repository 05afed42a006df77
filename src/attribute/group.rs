use std::collections::BTreeMap;
use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use pack_coding::UNSIGNED5;
use crate::attribute::{AttributeContext, AttributeLayouts, LayoutKind, OVERFLOW_BIT};
use crate::attribute::layout::{LayoutBands, Value};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::DecodeError;
use crate::header::SegmentHeader;
use crate::ic::{read_class_inner_classes, LocalInnerClass};
use crate::metadata::{read_metadata, Metadata};
use crate::stream::{sum, to_length, BandReader};

/// The contents of one attribute, as read from the bands.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttributeData {
	Values(Vec<Value>),
	Metadata(Metadata),
	InnerClasses(Vec<LocalInnerClass>),
	/// The code of a method, read with the code headers.
	Code,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawAttribute {
	pub(crate) index: usize,
	/// The `Utf8` entry with the name of the attribute.
	pub(crate) name: CpRef,
	pub(crate) data: AttributeData,
}

/// The flags and attributes of one class, field, method or code.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ObjectAttributes {
	pub(crate) flags: u64,
	pub(crate) attributes: Vec<RawAttribute>,
}

impl ObjectAttributes {
	/// The access flags, stored in the low bits of the flags.
	pub(crate) fn access_flags(&self) -> u16 {
		(self.flags & 0xffff) as u16
	}

	pub(crate) fn find(&self, index: usize) -> Option<&AttributeData> {
		self.attributes.iter()
			.find(|attribute| attribute.index == index)
			.map(|attribute| &attribute.data)
	}
}

/// Reads the flags and all attribute bands of `count` objects of one context.
///
/// For fields, `constant_kinds` has the kind of constant each field can have, found from its type.
pub(crate) fn read_attribute_group(
	reader: &mut BandReader,
	pool: &mut ConstantPool,
	layouts: &AttributeLayouts,
	header: &SegmentHeader,
	context: AttributeContext,
	count: usize,
	constant_kinds: &[Option<CpKind>],
) -> Result<Vec<ObjectAttributes>> {
	let prefix = context.band_prefix();

	let hi = if context.has_flags_hi(header) {
		reader.band(&format!("{prefix}_flags_hi"), UNSIGNED5, count)?
	} else {
		vec![0; count]
	};
	let lo = reader.band(&format!("{prefix}_flags_lo"), UNSIGNED5, count)?;
	let flags: Vec<u64> = hi.iter().zip(&lo)
		.map(|(&hi, &lo)| (hi as u64) << 32 | lo as u32 as u64)
		.collect();

	let overflowing = flags.iter().filter(|&&flags| flags & 1 << OVERFLOW_BIT != 0).count();
	let attr_count_name = format!("{prefix}_attr_count");
	let attr_counts = reader.counts(&attr_count_name, UNSIGNED5, overflowing)?;
	let indexes = reader.band(&format!("{prefix}_attr_indexes"), UNSIGNED5, sum(&attr_count_name, &attr_counts)?)?;

	// the layout index of each attribute of each object
	let mut slots: Vec<Vec<usize>> = Vec::with_capacity(count);
	let mut attr_counts = attr_counts.into_iter();
	let mut indexes = indexes.into_iter();
	for &flags in &flags {
		let mut object = Vec::new();
		for bit in context.first_attribute_bit()..64 {
			if bit != OVERFLOW_BIT && flags & 1 << bit != 0 {
				layouts.get(context, bit)
					.with_context(|| anyhow!("flag bit {bit} of {prefix} {} is set", slots.len()))?;
				object.push(bit);
			}
		}
		if flags & 1 << OVERFLOW_BIT != 0 {
			let n = attr_counts.next()
				.with_context(|| anyhow!("{attr_count_name} ran out of values"))?;
			for _ in 0..n {
				let index = indexes.next()
					.with_context(|| anyhow!("{prefix}_attr_indexes ran out of values"))?;
				let index = to_length(&format!("{prefix}_attr_indexes"), index)?;
				layouts.get(context, index)?;
				object.push(index);
			}
		}
		slots.push(object);
	}

	// where each layout is used, in object order
	let mut uses: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
	for (object, indices) in slots.iter().enumerate() {
		for (slot, &index) in indices.iter().enumerate() {
			uses.entry(index).or_default().push((object, slot));
		}
	}

	let total_calls: usize = uses.keys()
		.map(|&index| layouts.get(context, index).map(|layout| layout.backward_callables()))
		.sum::<Result<_>>()?;
	let calls = reader.counts(&format!("{prefix}_attr_calls"), UNSIGNED5, total_calls)?;
	let mut calls = calls.as_slice();

	let mut data: Vec<Vec<Option<AttributeData>>> = slots.iter()
		.map(|indices| vec![None; indices.len()])
		.collect();

	// the predefined layouts come first, then the ones defined by the segment
	let mut order = Vec::with_capacity(uses.len());
	for (&index, uses) in &uses {
		let layout = layouts.get(context, index)?;
		let defined = matches!(layout.kind, LayoutKind::Generic { predefined: None, .. });
		order.push((defined, index, layout, uses));
	}
	order.sort_by_key(|&(defined, index, ..)| (defined, index));

	for (_, index, layout, uses) in order {
		let (layout_calls, rest) = calls.split_at(layout.backward_callables());
		calls = rest;

		let name = format!("{prefix}_{}", layout.name);
		trace!("reading {} attributes {name} at index {index}", uses.len());

		let contents: Vec<AttributeData> = match &layout.kind {
			LayoutKind::Generic { layout, .. } => {
				trace!("layout of {name} is {:?}", layout.text());
				let mut bands = LayoutBands::read(reader, &name, layout, uses.len(), layout_calls)?;
				let mut contents = Vec::with_capacity(uses.len());
				for &(object, _) in uses {
					let constant_kind = constant_kinds.get(object).copied().flatten();
					let values = bands.next_attribute(&name, layout)?
						.into_iter()
						.map(|value| value.resolve(pool, constant_kind))
						.collect::<Result<Vec<_>>>()
						.with_context(|| anyhow!("in attribute {name} of {prefix} {object}"))?;
					contents.push(AttributeData::Values(values));
				}
				bands.finish(&name)?;
				contents
			},
			&LayoutKind::Metadata(kind) => {
				let calls = match layout_calls {
					&[calls] => calls,
					_ => bail!("annotation attributes have exactly one backward call count"),
				};
				read_metadata(reader, pool, prefix, kind, uses.len(), calls)?
					.into_iter()
					.map(AttributeData::Metadata)
					.collect()
			},
			LayoutKind::InnerClasses => {
				if context != AttributeContext::Class {
					bail!(DecodeError::format(format!("inner classes attribute in {prefix} context")));
				}
				read_class_inner_classes(reader, pool, uses.len())?
					.into_iter()
					.map(AttributeData::InnerClasses)
					.collect()
			},
			LayoutKind::Code => vec![AttributeData::Code; uses.len()],
		};

		for (&(object, slot), content) in uses.iter().zip(contents) {
			data[object][slot] = Some(content);
		}
	}

	let mut objects = Vec::with_capacity(count);
	for ((flags, indices), data) in flags.into_iter().zip(slots).zip(data) {
		let mut attributes = Vec::with_capacity(indices.len());
		for (index, data) in indices.into_iter().zip(data) {
			let layout = layouts.get(context, index)?;
			let data = data.with_context(|| anyhow!("attribute {} of {prefix} wasn't read", layout.name))?;
			attributes.push(RawAttribute { index, name: pool.ensure_utf8(&layout.name), data });
		}
		objects.push(ObjectAttributes { flags, attributes });
	}
	Ok(objects)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pack_coding::{Bhsd, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::attribute::{read_attribute_group, AttributeContext, AttributeData, AttributeLayout, AttributeLayouts, LayoutKind};
	use crate::attribute::layout::{IntKind, Layout, Value};
	use crate::metadata::Metadata;
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

	#[test]
	fn field_constants_and_overflow() -> Result<()> {
		let mut pool = crate::cp::testing::pool(vec![utf8(""), utf8("Foo.java"), CpEntry::Int(5), CpEntry::Long(7)])?;
		let header = crate::attribute::testing::header(150);
		let layouts = AttributeLayouts::predefined(&header)?;

		let data = encode(&[
			// flags_lo: a constant, a deprecated field with an attribute in the overflow, and nothing
			(UNSIGNED5, &[1 << 17 | 0x8, 1 << 20 | 1 << 16 | 0x2, 0]),
			// attr_count, attr_indexes
			(UNSIGNED5, &[1]),
			(UNSIGNED5, &[17]),
			// attr_calls: none
			// field_ConstantValue_KQ
			(UNSIGNED5, &[0, 0]),
		]);
		let mut reader = BandReader::new(&data);
		let objects = read_attribute_group(
			&mut reader, &mut pool, &layouts, &header, AttributeContext::Field, 3,
			&[Some(CpKind::Int), Some(CpKind::Long), None],
		)?;
		assert_eq!(reader.remaining(), 0);

		assert_eq!(objects.len(), 3);
		assert_eq!(objects[0].access_flags(), 0x8);
		assert_eq!(objects[0].find(17), Some(&AttributeData::Values(vec![
			Value::Ref { size: 2, entry: Some(pool.resolve(0, CpKind::Int)?) },
		])));
		assert_eq!(objects[1].access_flags(), 0x2);
		let indices: Vec<_> = objects[1].attributes.iter().map(|attribute| attribute.index).collect();
		assert_eq!(indices, vec![20, 17]);
		assert_eq!(objects[1].find(17), Some(&AttributeData::Values(vec![
			Value::Ref { size: 2, entry: Some(pool.resolve(0, CpKind::Long)?) },
		])));
		assert_eq!(objects[1].find(20), Some(&AttributeData::Values(vec![])));
		assert_eq!(pool.utf8(objects[1].attributes[0].name)?, JavaStr::from_str("Deprecated"));
		assert!(objects[2].attributes.is_empty());
		Ok(())
	}

	#[test]
	fn code_attributes_use_low_bits() -> Result<()> {
		let mut pool = crate::cp::testing::pool(vec![utf8("")])?;
		let header = crate::attribute::testing::header(150);
		let layouts = AttributeLayouts::predefined(&header)?;

		let data = encode(&[
			(UNSIGNED5, &[1 << 1]),
			// code_LineNumberTable_N, _bci_P, _line
			(UNSIGNED5, &[1]),
			(pack_coding::BCI5, &[2]),
			(UNSIGNED5, &[10]),
		]);
		let mut reader = BandReader::new(&data);
		let objects = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Code, 1, &[])?;
		assert_eq!(reader.remaining(), 0);
		assert_eq!(objects[0].find(1), Some(&AttributeData::Values(vec![
			Value::Int { kind: IntKind::Unsigned, size: 2, value: 1 },
			Value::Int { kind: IntKind::Bci, size: 2, value: 2 },
			Value::Int { kind: IntKind::Unsigned, size: 2, value: 10 },
		])));
		Ok(())
	}

	#[test]
	fn defined_layouts_after_predefined() -> Result<()> {
		let mut pool = crate::cp::testing::pool(vec![utf8("")])?;
		let header = crate::attribute::testing::header(150);
		let mut layouts = AttributeLayouts::predefined(&header)?;
		layouts.contexts[AttributeContext::Field as usize].insert(18, AttributeLayout {
			name: JavaStr::from_str("Custom").to_owned(),
			kind: LayoutKind::Generic { layout: Layout::parse("H")?, predefined: None },
		});

		let data = encode(&[
			(UNSIGNED5, &[1 << 21 | 1 << 18]),
			// field_attr_calls, for the annotations
			(UNSIGNED5, &[0]),
			// field_RVA_anno_N
			(UNSIGNED5, &[0]),
			// field_Custom_H
			(UNSIGNED5, &[300]),
		]);
		let mut reader = BandReader::new(&data);
		let objects = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Field, 1, &[None])?;
		assert_eq!(reader.remaining(), 0);

		assert_eq!(objects[0].find(18), Some(&AttributeData::Values(vec![
			Value::Int { kind: IntKind::Unsigned, size: 2, value: 300 },
		])));
		assert_eq!(objects[0].find(21), Some(&AttributeData::Metadata(Metadata::Annotations(vec![]))));
		Ok(())
	}

	#[test]
	fn undefined_attribute_bit() -> Result<()> {
		let mut pool = crate::cp::testing::pool(vec![utf8("")])?;
		let header = crate::attribute::testing::header(150);
		let layouts = AttributeLayouts::predefined(&header)?;

		let data = encode(&[(UNSIGNED5, &[1 << 30])]);
		let mut reader = BandReader::new(&data);
		let error = read_attribute_group(&mut reader, &mut pool, &layouts, &header, AttributeContext::Class, 1, &[])
			.unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::Format(_))));
		Ok(())
	}
}
