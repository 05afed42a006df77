//! Attribute definitions and the bands of attributes.
//!
//! Each class, field, method and code has a set of flags. The low bits are access flags, and most of
//! the others tell whether an attribute is present. Each attribute is identified by its index in an
//! [`AttributeContext`], and each index has an [`AttributeLayout`] describing how its contents are stored.
//! Most of them are predefined, and the segment may add more.

mod group;
pub(crate) mod layout;

pub(crate) use group::{read_attribute_group, AttributeData, ObjectAttributes, RawAttribute};

use std::collections::BTreeMap;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use log::debug;
use pack_coding::{BYTE1, UNSIGNED5};
use crate::cp::{ConstantPool, CpKind};
use crate::DecodeError;
use crate::header::SegmentHeader;
use crate::metadata::MetadataKind;
use crate::stream::BandReader;
use layout::Layout;

/// The kind of thing an attribute is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeContext {
	Class,
	Field,
	Method,
	Code,
}

impl AttributeContext {
	pub const ALL: [AttributeContext; 4] = [
		AttributeContext::Class, AttributeContext::Field, AttributeContext::Method, AttributeContext::Code,
	];

	fn from_bits(bits: i64) -> AttributeContext {
		match bits & 3 {
			0 => AttributeContext::Class,
			1 => AttributeContext::Field,
			2 => AttributeContext::Method,
			_ => AttributeContext::Code,
		}
	}

	/// The prefix of the names of the bands of this context.
	pub fn band_prefix(self) -> &'static str {
		match self {
			AttributeContext::Class => "class",
			AttributeContext::Field => "field",
			AttributeContext::Method => "method",
			AttributeContext::Code => "code",
		}
	}

	/// Whether the flags of this context have a high part, allowing for more attribute indices.
	pub(crate) fn has_flags_hi(self, header: &SegmentHeader) -> bool {
		let options = header.options;
		match self {
			AttributeContext::Class => options.have_class_flags_hi(),
			AttributeContext::Field => options.have_field_flags_hi(),
			AttributeContext::Method => options.have_method_flags_hi(),
			AttributeContext::Code => options.have_code_flags_hi(),
		}
	}

	/// The lowest flag bit used for attributes, the bits below are access flags.
	pub(crate) fn first_attribute_bit(self) -> usize {
		match self {
			AttributeContext::Code => 0,
			_ => 17,
		}
	}
}

/// The flag bit telling that an object has more attributes listed in the `*_attr_indexes` band.
pub(crate) const OVERFLOW_BIT: usize = 16;

/// Attributes with a meaning known to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Predefined {
	SourceFile,
	EnclosingMethod,
	Signature,
	Deprecated,
	ClassFileVersion,
	ConstantValue,
	Exceptions,
	StackMapTable,
	LineNumberTable,
	LocalVariableTable,
	LocalVariableTypeTable,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LayoutKind {
	/// An attribute stored as described by a layout.
	///
	/// The attribute is known to the decoder if `predefined` is set.
	Generic { layout: Layout, predefined: Option<Predefined> },
	/// The code of a method. It doesn't have bands of its own.
	Code,
	/// The inner classes of a class, stored relative to the inner class bands of the segment.
	InnerClasses,
	/// Annotations, stored in the metadata bands.
	Metadata(MetadataKind),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttributeLayout {
	pub(crate) name: JavaString,
	pub(crate) kind: LayoutKind,
}

impl AttributeLayout {
	fn generic(name: &str, layout: &str, predefined: Option<Predefined>) -> Result<AttributeLayout> {
		Ok(AttributeLayout {
			name: JavaStr::from_str(name).to_owned(),
			kind: LayoutKind::Generic { layout: Layout::parse(layout)?, predefined },
		})
	}

	fn special(name: &str, kind: LayoutKind) -> AttributeLayout {
		AttributeLayout { name: JavaStr::from_str(name).to_owned(), kind }
	}

	/// The number of call counts this layout takes from the `*_attr_calls` band.
	pub(crate) fn backward_callables(&self) -> usize {
		match &self.kind {
			LayoutKind::Generic { layout, .. } => layout.backward_callables(),
			LayoutKind::Code | LayoutKind::InnerClasses => 0,
			// the callable for values calls itself for array elements and nested annotations
			LayoutKind::Metadata(_) => 1,
		}
	}
}

const STACK_MAP_TABLE: &str = concat!(
	"[NH[(1)]]",
	"[TB(64-127)[(2)](247)[(1)(2)](248-251)[(1)](252)[(1)(2)](253)[(1)(2)(2)](254)[(1)(2)(2)(2)]",
	"(255)[(1)NH[(2)]NH[(2)]]()[]]",
	"[H]",
	"[TB(7)[RCH](8)[PH]()[]]",
);

/// The layouts of all attribute indices, per context.
#[derive(Debug, Clone)]
pub(crate) struct AttributeLayouts {
	contexts: [BTreeMap<usize, AttributeLayout>; 4],
}

impl AttributeLayouts {
	fn predefined(header: &SegmentHeader) -> Result<AttributeLayouts> {
		use AttributeContext::*;
		use Predefined::*;

		let mut layouts = AttributeLayouts { contexts: Default::default() };
		let mut define = |context: AttributeContext, index: usize, layout: AttributeLayout| {
			layouts.contexts[context as usize].insert(index, layout);
		};

		define(Class, 17, AttributeLayout::generic("SourceFile", "RUNH", Some(SourceFile))?);
		define(Class, 18, AttributeLayout::generic("EnclosingMethod", "RCHRDNH", Some(EnclosingMethod))?);
		define(Class, 23, AttributeLayout::special("InnerClasses", LayoutKind::InnerClasses));
		define(Class, 24, AttributeLayout::generic(".ClassFile.version", "HH", Some(ClassFileVersion))?);

		define(Field, 17, AttributeLayout::generic("ConstantValue", "KQH", Some(ConstantValue))?);

		define(Method, 17, AttributeLayout::special("Code", LayoutKind::Code));
		define(Method, 18, AttributeLayout::generic("Exceptions", "NH[RCH]", Some(Exceptions))?);
		define(Method, 23, AttributeLayout::special("RuntimeVisibleParameterAnnotations", LayoutKind::Metadata(MetadataKind::VisibleParameter)));
		define(Method, 24, AttributeLayout::special("RuntimeInvisibleParameterAnnotations", LayoutKind::Metadata(MetadataKind::InvisibleParameter)));
		define(Method, 25, AttributeLayout::special("AnnotationDefault", LayoutKind::Metadata(MetadataKind::AnnotationDefault)));

		for context in [Class, Field, Method] {
			define(context, 19, AttributeLayout::generic("Signature", "RSH", Some(Signature))?);
			define(context, 20, AttributeLayout::generic("Deprecated", "", Some(Deprecated))?);
			define(context, 21, AttributeLayout::special("RuntimeVisibleAnnotations", LayoutKind::Metadata(MetadataKind::Visible)));
			define(context, 22, AttributeLayout::special("RuntimeInvisibleAnnotations", LayoutKind::Metadata(MetadataKind::Invisible)));
		}

		if header.major_version >= 160 {
			define(Code, 0, AttributeLayout::generic("StackMapTable", STACK_MAP_TABLE, Some(StackMapTable))?);
		}
		define(Code, 1, AttributeLayout::generic("LineNumberTable", "NH[PHH]", Some(LineNumberTable))?);
		define(Code, 2, AttributeLayout::generic("LocalVariableTable", "NH[PHOHRUHRSHH]", Some(LocalVariableTable))?);
		define(Code, 3, AttributeLayout::generic("LocalVariableTypeTable", "NH[PHOHRUHRSHH]", Some(LocalVariableTypeTable))?);

		Ok(layouts)
	}

	/// Reads the attribute definition bands, adding the attributes defined by the segment to the
	/// predefined ones.
	pub(crate) fn read(reader: &mut BandReader, pool: &ConstantPool, header: &SegmentHeader) -> Result<AttributeLayouts> {
		let mut layouts = AttributeLayouts::predefined(header)?;

		let count = header.attr_definition_count;
		let headers = reader.band("attr_definition_headers", BYTE1, count)?;
		let names = reader.band("attr_definition_name", UNSIGNED5, count)?;
		let texts = reader.band("attr_definition_layout", UNSIGNED5, count)?;

		let mut next_overflow: Vec<usize> = AttributeContext::ALL.iter()
			.map(|context| if context.has_flags_hi(header) { 63 } else { 32 })
			.collect();

		for ((definition, name), text) in headers.into_iter().zip(names).zip(texts) {
			let context = AttributeContext::from_bits(definition);
			let index = match (definition >> 2) - 1 {
				-1 => {
					let index = next_overflow[context as usize];
					next_overflow[context as usize] += 1;
					index
				},
				index => index as usize,
			};
			let name = pool.utf8(pool.resolve(name, CpKind::Utf8)?)?.to_owned();
			let text = pool.utf8(pool.resolve(text, CpKind::Utf8)?)?;
			let text = text.as_str()
				.map_err(|_| anyhow!(DecodeError::format(format!("attribute layout of {name} isn't valid UTF-8"))))?;
			let layout = Layout::parse(text)
				.with_context(|| anyhow!("in definition of attribute {name} for {} index {index}", context.band_prefix()))?;

			debug!("defined attribute {name} at {} index {index} with layout {text:?}", context.band_prefix());
			layouts.contexts[context as usize].insert(index, AttributeLayout {
				name,
				kind: LayoutKind::Generic { layout, predefined: None },
			});
		}

		Ok(layouts)
	}

	pub(crate) fn get(&self, context: AttributeContext, index: usize) -> Result<&AttributeLayout> {
		match self.contexts[context as usize].get(&index) {
			Some(layout) => Ok(layout),
			None => bail!(DecodeError::format(format!("no attribute defined at {} index {index}", context.band_prefix()))),
		}
	}

	/// Gets the index an attribute with a special meaning is defined at.
	pub(crate) fn index_of(&self, context: AttributeContext, matches: impl Fn(&LayoutKind) -> bool) -> Option<usize> {
		self.contexts[context as usize].iter()
			.find(|(_, layout)| matches(&layout.kind))
			.map(|(&index, _)| index)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::attribute::{AttributeContext, AttributeLayouts, LayoutKind, Predefined};
	use crate::header::{CpCounts, SegmentHeader, SegmentOptions};

	pub(crate) fn header(major_version: u16) -> SegmentHeader {
		SegmentHeader {
			minor_version: 7,
			major_version,
			options: SegmentOptions(0),
			archive_size: 0,
			archive_next_count: 0,
			archive_modtime: 0,
			file_count: 0,
			band_headers_size: 0,
			attr_definition_count: 0,
			cp: CpCounts::default(),
			ic_count: 0,
			default_class_minor_version: 0,
			default_class_major_version: 49,
			class_count: 0,
		}
	}

	#[test]
	fn predefined() -> Result<()> {
		let layouts = AttributeLayouts::predefined(&header(150))?;
		let source_file = layouts.get(AttributeContext::Class, 17)?;
		assert_eq!(source_file.name, JavaStr::from_str("SourceFile"));
		assert!(matches!(source_file.kind, LayoutKind::Generic { predefined: Some(Predefined::SourceFile), .. }));
		assert_eq!(layouts.get(AttributeContext::Method, 17)?.kind, LayoutKind::Code);
		assert_eq!(layouts.get(AttributeContext::Method, 21)?.backward_callables(), 1);
		assert_eq!(layouts.index_of(AttributeContext::Class, |kind| kind == &LayoutKind::InnerClasses), Some(23));
		// the stack map table is only known from version 160 on
		assert!(layouts.get(AttributeContext::Code, 0).is_err());
		assert!(layouts.get(AttributeContext::Field, 18).is_err());

		let layouts = AttributeLayouts::predefined(&header(160))?;
		assert!(matches!(layouts.get(AttributeContext::Code, 0)?.kind, LayoutKind::Generic { predefined: Some(Predefined::StackMapTable), .. }));
		assert_eq!(layouts.get(AttributeContext::Code, 0)?.backward_callables(), 0);
		Ok(())
	}
}
