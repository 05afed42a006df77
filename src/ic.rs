//! The inner class bands.
//!
//! The segment has one global table of inner classes. Each class gets the entries for the classes it
//! references, adjusted by an optional `InnerClasses` attribute of its own.

use anyhow::{anyhow, Context, Result};
use java_string::JavaStr;
use log::trace;
use pack_coding::{DELTA5, UDELTA5, UNSIGNED5};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::stream::{lengths, sum, BandReader};

/// Flag bit of the `ic_flags` band telling that the outer class and the name are given.
const LONG_FORM: i64 = 1 << 16;

/// An entry of an `InnerClasses` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InnerClass {
	/// The `Class` entry of the inner class.
	pub inner: CpRef,
	/// The `Class` entry of the class this is a member of, if any.
	pub outer: Option<CpRef>,
	/// The simple name, absent for anonymous classes.
	pub name: Option<CpRef>,
	pub flags: u16,
}

/// An entry of the inner classes attribute of a class in the bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LocalInnerClass {
	/// The same entry as in the global table for that class.
	Global(CpRef),
	Explicit(InnerClass),
}

/// The parts of an inner class name: the outer class and the simple name.
///
/// `pkg/Outer$Inner` has the outer class `pkg/Outer` and the name `Inner`. `pkg/Outer$1` is an anonymous
/// class and has neither, and the local class `pkg/Outer$1$Local` only has the name `Local`.
fn predict(name: &JavaStr) -> Result<(Option<&JavaStr>, Option<&JavaStr>)> {
	let bytes = name.as_bytes();
	let package_len = bytes.iter().rposition(|&b| b == b'/').map_or(0, |i| i + 1);
	let is_number = |range: &[u8]| !range.is_empty() && range.iter().all(u8::is_ascii_digit);

	let Some(last) = bytes.iter().rposition(|&b| b == b'$').filter(|&i| i >= package_len) else {
		return Ok((None, None));
	};
	let slice = |start: usize, end: usize| name.get(start..end)
		.with_context(|| anyhow!("can't split inner class name {name:?} at {start}..{end}"));

	if is_number(&bytes[last + 1..]) {
		return Ok((None, None));
	}
	let simple = slice(last + 1, bytes.len())?;
	let before = bytes[..last].iter().rposition(|&b| b == b'$').filter(|&i| i > package_len);
	if let Some(first) = before {
		if is_number(&bytes[first + 1..last]) {
			return Ok((None, Some(simple)));
		}
	}
	Ok((Some(slice(0, last)?), Some(simple)))
}

/// Reads the global inner classes table.
///
/// Outer classes and names that are predicted from the name of the inner class are added to the pool.
pub(crate) fn read_inner_classes(reader: &mut BandReader, pool: &mut ConstantPool, count: usize) -> Result<Vec<InnerClass>> {
	let this_class = reader.band("ic_this_class", UDELTA5, count)?;
	let flags = reader.band("ic_flags", UNSIGNED5, count)?;
	let long_forms = flags.iter().filter(|&&flags| flags & LONG_FORM != 0).count();
	let outer_class = reader.band("ic_outer_class", DELTA5, long_forms)?;
	let name = reader.band("ic_name", DELTA5, long_forms)?;

	let mut explicit = outer_class.into_iter().zip(name);
	let mut inner_classes = Vec::with_capacity(count);
	for (this_class, flags) in this_class.into_iter().zip(flags) {
		let inner = pool.resolve(this_class, CpKind::Class)?;
		let (outer, name) = if flags & LONG_FORM != 0 {
			let (outer, name) = explicit.next()
				.with_context(|| anyhow!("ic_outer_class ran out of values"))?;
			(pool.resolve_nullable(outer, CpKind::Class)?, pool.resolve_nullable(name, CpKind::Utf8)?)
		} else {
			let class_name = pool.class_name(inner)?.to_owned();
			let (outer, name) = predict(&class_name)?;
			(outer.map(|outer| pool.ensure_class(outer)), name.map(|name| pool.ensure_utf8(name)))
		};
		let inner_class = InnerClass { inner, outer, name, flags: (flags & 0xffff) as u16 };
		trace!("inner class {inner_class:?}");
		inner_classes.push(inner_class);
	}
	Ok(inner_classes)
}

/// Reads the bands of the `InnerClasses` attributes of `count` classes.
pub(crate) fn read_class_inner_classes(reader: &mut BandReader, pool: &ConstantPool, count: usize) -> Result<Vec<Vec<LocalInnerClass>>> {
	let counts = reader.band("class_InnerClasses_N", UNSIGNED5, count)?;
	let counts = lengths("class_InnerClasses_N", &counts)?;
	let total = sum("class_InnerClasses_N", &counts)?;
	let classes = reader.band("class_InnerClasses_RC", UNSIGNED5, total)?;
	let flags = reader.band("class_InnerClasses_F", UNSIGNED5, total)?;
	let explicit_count = flags.iter().filter(|&&flags| flags != 0).count();
	let outer_class = reader.band("class_InnerClasses_outer_RCN", UNSIGNED5, explicit_count)?;
	let name = reader.band("class_InnerClasses_name_RUN", UNSIGNED5, explicit_count)?;

	let mut explicit = outer_class.into_iter().zip(name);
	let mut tuples = classes.into_iter().zip(flags);
	let mut attributes = Vec::with_capacity(count);
	for n in counts {
		let mut attribute = Vec::with_capacity(n);
		for (class, flags) in tuples.by_ref().take(n) {
			let inner = pool.resolve(class, CpKind::Class)?;
			if flags == 0 {
				attribute.push(LocalInnerClass::Global(inner));
			} else {
				let (outer, name) = explicit.next()
					.with_context(|| anyhow!("class_InnerClasses_outer_RCN ran out of values"))?;
				attribute.push(LocalInnerClass::Explicit(InnerClass {
					inner,
					outer: pool.resolve_nullable(outer, CpKind::Class)?,
					name: pool.resolve_nullable(name, CpKind::Utf8)?,
					flags: (flags & !LONG_FORM & 0xffff) as u16,
				}));
			}
		}
		attributes.push(attribute);
	}
	Ok(attributes)
}
