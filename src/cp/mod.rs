//! The constant pool of a segment.
//!
//! All classes of a segment share one pool, stored in one band group per kind of entry. References
//! from other bands are indices into the entries of one kind. Resolving such an index gives a
//! [`CpRef`], which is the identity of the entry: the same index always resolves to the same
//! [`CpRef`], and comparing two of them compares the entries they refer to.

mod bands;

pub(crate) use bands::read_constant_pool;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Result};
use java_string::{JavaStr, JavaString};
use crate::DecodeError;

/// The kinds of constant pool entries, in the order they are stored in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CpKind {
	Utf8,
	Int,
	Float,
	Long,
	Double,
	String,
	Class,
	Signature,
	Descr,
	Field,
	Method,
	IMethod,
}

impl CpKind {
	pub const ALL: [CpKind; 12] = [
		CpKind::Utf8, CpKind::Int, CpKind::Float, CpKind::Long, CpKind::Double, CpKind::String,
		CpKind::Class, CpKind::Signature, CpKind::Descr, CpKind::Field, CpKind::Method, CpKind::IMethod,
	];

	fn slot(self) -> usize {
		self as usize
	}

	/// Whether an entry of this kind takes up two slots in a class file constant pool.
	pub fn is_wide(self) -> bool {
		matches!(self, CpKind::Long | CpKind::Double)
	}
}

impl Display for CpKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			CpKind::Utf8 => "Utf8",
			CpKind::Int => "Int",
			CpKind::Float => "Float",
			CpKind::Long => "Long",
			CpKind::Double => "Double",
			CpKind::String => "String",
			CpKind::Class => "Class",
			CpKind::Signature => "Signature",
			CpKind::Descr => "Descr",
			CpKind::Field => "Field",
			CpKind::Method => "Method",
			CpKind::IMethod => "IMethod",
		})
	}
}

/// A reference to an entry of a [`ConstantPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpRef {
	kind: CpKind,
	index: usize,
}

impl CpRef {
	pub fn kind(&self) -> CpKind {
		self.kind
	}

	/// The index within the entries of the same kind.
	pub fn index(&self) -> usize {
		self.index
	}
}

impl Display for CpRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}#{}", self.kind, self.index)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
	Utf8(JavaString),
	Int(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(CpRef),
	Class(CpRef),
	/// A descriptor or generic signature, stored as a form with the class names taken out.
	///
	/// In a class file, this is a `Utf8` entry with the content `text`.
	Signature { form: CpRef, classes: Vec<CpRef>, text: JavaString },
	/// A name and type.
	Descr { name: CpRef, descriptor: CpRef },
	Field { class: CpRef, descr: CpRef },
	Method { class: CpRef, descr: CpRef },
	IMethod { class: CpRef, descr: CpRef },
}

impl CpEntry {
	pub fn kind(&self) -> CpKind {
		match self {
			CpEntry::Utf8(_) => CpKind::Utf8,
			CpEntry::Int(_) => CpKind::Int,
			CpEntry::Float(_) => CpKind::Float,
			CpEntry::Long(_) => CpKind::Long,
			CpEntry::Double(_) => CpKind::Double,
			CpEntry::String(_) => CpKind::String,
			CpEntry::Class(_) => CpKind::Class,
			CpEntry::Signature { .. } => CpKind::Signature,
			CpEntry::Descr { .. } => CpKind::Descr,
			CpEntry::Field { .. } => CpKind::Field,
			CpEntry::Method { .. } => CpKind::Method,
			CpEntry::IMethod { .. } => CpKind::IMethod,
		}
	}

	/// The entries this one refers to, that must also be in a class file constant pool using this entry.
	pub fn dependencies(&self) -> Vec<CpRef> {
		match self {
			CpEntry::Utf8(_) | CpEntry::Int(_) | CpEntry::Float(_) | CpEntry::Long(_) | CpEntry::Double(_) => Vec::new(),
			CpEntry::Signature { .. } => Vec::new(),
			CpEntry::String(utf8) | CpEntry::Class(utf8) => vec![*utf8],
			CpEntry::Descr { name, descriptor } => vec![*name, *descriptor],
			CpEntry::Field { class, descr } | CpEntry::Method { class, descr } | CpEntry::IMethod { class, descr } =>
				vec![*class, *descr],
		}
	}
}

#[derive(Debug, Clone, Default)]
struct Members {
	fields: Vec<CpRef>,
	methods: Vec<CpRef>,
}

/// The constant pool of a segment.
///
/// The entries read from the constant pool bands come first, followed by the ones added while reading
/// the other bands, for example predicted inner class names and attribute names.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
	entries: [Vec<CpEntry>; 12],
	band_counts: [usize; 12],

	utf8_lookup: HashMap<JavaString, usize>,
	class_lookup: HashMap<usize, usize>,
	members: HashMap<CpRef, Members>,
}

impl ConstantPool {
	fn unresolved(index: i64, expected: impl Display, message: impl Into<String>) -> anyhow::Error {
		anyhow!(DecodeError::UnresolvedReference { index, expected: expected.to_string(), message: message.into() })
	}

	/// The number of entries of a kind read from the constant pool bands.
	pub fn band_count(&self, kind: CpKind) -> usize {
		self.band_counts[kind.slot()]
	}

	/// The number of entries of a kind, including the ones added later.
	pub fn len(&self, kind: CpKind) -> usize {
		self.entries[kind.slot()].len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.iter().all(Vec::is_empty)
	}

	/// Resolves an index into the entries of the given kind read from the bands.
	pub fn resolve(&self, index: i64, kind: CpKind) -> Result<CpRef> {
		let len = self.band_count(kind);
		match usize::try_from(index) {
			Ok(i) if i < len => Ok(CpRef { kind, index: i }),
			_ => Err(Self::unresolved(index, kind, format!("there are only {len} entries of that kind"))),
		}
	}

	/// Resolves an index shifted by one, where `0` means no entry.
	pub fn resolve_nullable(&self, index: i64, kind: CpKind) -> Result<Option<CpRef>> {
		if index == 0 {
			Ok(None)
		} else {
			self.resolve(index - 1, kind).map(Some)
		}
	}

	/// Resolves an index into all entries read from the bands, with the kinds in the order of [`CpKind::ALL`].
	pub fn resolve_any(&self, index: i64) -> Result<CpRef> {
		let Ok(mut rest) = usize::try_from(index) else {
			return Err(Self::unresolved(index, "any entry", "negative index"));
		};
		for kind in CpKind::ALL {
			let len = self.band_count(kind);
			if rest < len {
				return Ok(CpRef { kind, index: rest });
			}
			rest -= len;
		}
		let total: usize = self.band_counts.iter().sum();
		Err(Self::unresolved(index, "any entry", format!("there are only {total} entries")))
	}

	/// Checks that a reference has one of the given kinds.
	pub fn expect(&self, cp: CpRef, kinds: &[CpKind]) -> Result<CpRef> {
		if kinds.contains(&cp.kind) {
			Ok(cp)
		} else {
			let expected = kinds.iter().map(CpKind::to_string).collect::<Vec<_>>().join(" or ");
			Err(Self::unresolved(cp.index as i64, expected, format!("got an entry of kind {}", cp.kind)))
		}
	}

	pub fn get(&self, cp: CpRef) -> Result<&CpEntry> {
		self.entries[cp.kind.slot()].get(cp.index)
			.ok_or_else(|| Self::unresolved(cp.index as i64, cp.kind, "reference isn't from this pool"))
	}

	pub fn utf8(&self, cp: CpRef) -> Result<&JavaStr> {
		let CpEntry::Utf8(string) = self.get(cp)? else {
			return Err(Self::unresolved(cp.index as i64, CpKind::Utf8, format!("got {cp}")));
		};
		Ok(string)
	}

	/// Gets the text of a `Utf8` or a `Signature` entry, as both are strings in a class file.
	pub fn text(&self, cp: CpRef) -> Result<&JavaStr> {
		match self.get(cp)? {
			CpEntry::Utf8(string) => Ok(string),
			CpEntry::Signature { text, .. } => Ok(text),
			_ => Err(Self::unresolved(cp.index as i64, "Utf8 or Signature", format!("got {cp}"))),
		}
	}

	/// Gets the internal name of the class of a `Class` entry.
	pub fn class_name(&self, cp: CpRef) -> Result<&JavaStr> {
		let CpEntry::Class(name) = self.get(cp)? else {
			return Err(Self::unresolved(cp.index as i64, CpKind::Class, format!("got {cp}")));
		};
		self.utf8(*name)
	}

	/// Gets the name and the descriptor of a `Descr` entry.
	pub fn descr(&self, cp: CpRef) -> Result<(CpRef, CpRef)> {
		let CpEntry::Descr { name, descriptor } = self.get(cp)? else {
			return Err(Self::unresolved(cp.index as i64, CpKind::Descr, format!("got {cp}")));
		};
		Ok((*name, *descriptor))
	}

	/// Gets the class and the name and type of a `Field`, `Method` or `IMethod` entry.
	pub fn member(&self, cp: CpRef) -> Result<(CpRef, CpRef)> {
		match self.get(cp)? {
			CpEntry::Field { class, descr } | CpEntry::Method { class, descr } | CpEntry::IMethod { class, descr } =>
				Ok((*class, *descr)),
			_ => Err(Self::unresolved(cp.index as i64, "Field, Method or IMethod", format!("got {cp}"))),
		}
	}

	/// Gets the name of a member reference.
	pub fn member_name(&self, cp: CpRef) -> Result<&JavaStr> {
		let (_, descr) = self.member(cp)?;
		let (name, _) = self.descr(descr)?;
		self.utf8(name)
	}

	/// Gets the descriptor of a member reference.
	pub fn member_descriptor(&self, cp: CpRef) -> Result<&JavaStr> {
		let (_, descr) = self.member(cp)?;
		let (_, descriptor) = self.descr(descr)?;
		self.text(descriptor)
	}

	fn push(&mut self, entry: CpEntry) -> CpRef {
		let kind = entry.kind();
		let entries = &mut self.entries[kind.slot()];
		entries.push(entry);
		CpRef { kind, index: entries.len() - 1 }
	}

	/// Gets a `Utf8` entry with the given content, adding it if there's none yet.
	pub(crate) fn ensure_utf8(&mut self, string: &JavaStr) -> CpRef {
		if let Some(&index) = self.utf8_lookup.get(string) {
			return CpRef { kind: CpKind::Utf8, index };
		}
		let cp = self.push(CpEntry::Utf8(string.to_owned()));
		self.utf8_lookup.insert(string.to_owned(), cp.index);
		cp
	}

	/// Gets a `Class` entry for a class name, adding it (and its name) if there's none yet.
	pub(crate) fn ensure_class(&mut self, name: &JavaStr) -> CpRef {
		let utf8 = self.ensure_utf8(name);
		if let Some(&index) = self.class_lookup.get(&utf8.index) {
			return CpRef { kind: CpKind::Class, index };
		}
		let cp = self.push(CpEntry::Class(utf8));
		self.class_lookup.insert(utf8.index, cp.index);
		cp
	}

	/// Marks all entries so far as the ones from the bands, and indexes them for the lookups.
	fn finish_bands(&mut self) -> Result<()> {
		for kind in CpKind::ALL {
			self.band_counts[kind.slot()] = self.len(kind);
		}

		for (index, entry) in self.entries[CpKind::Utf8.slot()].iter().enumerate() {
			if let CpEntry::Utf8(string) = entry {
				self.utf8_lookup.entry(string.clone()).or_insert(index);
			}
		}
		for (index, entry) in self.entries[CpKind::Class.slot()].iter().enumerate() {
			if let CpEntry::Class(utf8) = entry {
				self.class_lookup.entry(utf8.index).or_insert(index);
			}
		}

		let mut members: HashMap<CpRef, Members> = HashMap::new();
		for kind in [CpKind::Field, CpKind::Method] {
			for (index, entry) in self.entries[kind.slot()].iter().enumerate() {
				let (CpEntry::Field { class, .. } | CpEntry::Method { class, .. }) = entry else {
					bail!("entry {index} of kind {kind} has the wrong type");
				};
				let cp = CpRef { kind, index };
				let list = members.entry(*class).or_default();
				if kind == CpKind::Field {
					list.fields.push(cp);
				} else {
					list.methods.push(cp);
				}
			}
		}
		self.members = members;
		Ok(())
	}

	/// The `Field` entries with the given class, in pool order.
	pub fn fields_of(&self, class: CpRef) -> &[CpRef] {
		match self.members.get(&class) {
			Some(members) => &members.fields,
			None => &[],
		}
	}

	/// The `Method` entries with the given class, in pool order.
	pub fn methods_of(&self, class: CpRef) -> &[CpRef] {
		match self.members.get(&class) {
			Some(members) => &members.methods,
			None => &[],
		}
	}

	/// The `Method` entries with the given class that are named `<init>`, in pool order.
	pub fn initializers_of(&self, class: CpRef) -> Result<Vec<CpRef>> {
		let mut initializers = Vec::new();
		for &method in self.methods_of(class) {
			if self.member_name(method)? == JavaStr::from_str("<init>") {
				initializers.push(method);
			}
		}
		Ok(initializers)
	}
}

#[cfg(test)]
pub(crate) mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::cp::{ConstantPool, CpEntry, CpKind, CpRef};
	use crate::DecodeError;

	pub(crate) fn cp(kind: CpKind, index: usize) -> CpRef {
		CpRef { kind, index }
	}

	pub(crate) fn pool(entries: Vec<CpEntry>) -> Result<ConstantPool> {
		let mut pool = ConstantPool::default();
		for entry in entries {
			pool.push(entry);
		}
		pool.finish_bands()?;
		Ok(pool)
	}

	fn utf8(s: &str) -> CpEntry {
		CpEntry::Utf8(JavaStr::from_str(s).to_owned())
	}

	#[test]
	fn resolve() -> Result<()> {
		let pool = pool(vec![utf8(""), utf8("a"), CpEntry::Int(3)])?;

		let a = pool.resolve(1, CpKind::Utf8)?;
		assert_eq!(pool.utf8(a)?, JavaStr::from_str("a"));
		assert_eq!(pool.resolve(1, CpKind::Utf8)?, a);
		assert_eq!(pool.resolve_nullable(0, CpKind::Int)?, None);
		assert_eq!(pool.get(pool.resolve_nullable(1, CpKind::Int)?.unwrap())?, &CpEntry::Int(3));

		let error = pool.resolve(2, CpKind::Utf8).unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::UnresolvedReference { index: 2, .. })));
		assert!(pool.resolve(-1, CpKind::Utf8).is_err());
		assert!(pool.resolve(0, CpKind::Class).is_err());
		Ok(())
	}

	#[test]
	fn resolve_any_in_kind_order() -> Result<()> {
		let pool = pool(vec![utf8(""), utf8("a"), CpEntry::Long(1), CpEntry::Int(3)])?;
		assert_eq!(pool.resolve_any(2)?.kind(), CpKind::Int);
		assert_eq!(pool.resolve_any(3)?.kind(), CpKind::Long);
		assert!(pool.resolve_any(4).is_err());
		Ok(())
	}

	#[test]
	fn expect_kind() -> Result<()> {
		let pool = pool(vec![utf8("")])?;
		let cp = pool.resolve(0, CpKind::Utf8)?;
		assert_eq!(pool.expect(cp, &[CpKind::Int, CpKind::Utf8])?, cp);
		assert!(pool.expect(cp, &[CpKind::Class]).is_err());
		assert!(pool.class_name(cp).is_err());
		Ok(())
	}

	#[test]
	fn ensure_reuses_entries() -> Result<()> {
		let mut pool = pool(vec![utf8(""), utf8("a/B")])?;
		let name = pool.resolve(1, CpKind::Utf8)?;
		assert_eq!(pool.ensure_utf8(JavaStr::from_str("a/B")), name);

		let class = pool.ensure_class(JavaStr::from_str("a/B"));
		assert_eq!(pool.get(class)?, &CpEntry::Class(name));
		assert_eq!(pool.ensure_class(JavaStr::from_str("a/B")), class);
		assert_eq!(pool.len(CpKind::Class), 1);
		// synthesised entries can't be referenced from bands
		assert_eq!(pool.band_count(CpKind::Class), 0);
		assert!(pool.resolve(0, CpKind::Class).is_err());
		Ok(())
	}

	#[test]
	fn members() -> Result<()> {
		let pool = pool(vec![
			utf8(""), utf8("a/B"), utf8("<init>"), utf8("f"), utf8("()V"),
			CpEntry::Class(CpRef { kind: CpKind::Utf8, index: 1 }),
			CpEntry::Signature {
				form: CpRef { kind: CpKind::Utf8, index: 4 },
				classes: Vec::new(),
				text: JavaStr::from_str("()V").to_owned(),
			},
			CpEntry::Descr {
				name: CpRef { kind: CpKind::Utf8, index: 2 },
				descriptor: CpRef { kind: CpKind::Signature, index: 0 },
			},
			CpEntry::Descr {
				name: CpRef { kind: CpKind::Utf8, index: 3 },
				descriptor: CpRef { kind: CpKind::Signature, index: 0 },
			},
			CpEntry::Method {
				class: CpRef { kind: CpKind::Class, index: 0 },
				descr: CpRef { kind: CpKind::Descr, index: 1 },
			},
			CpEntry::Method {
				class: CpRef { kind: CpKind::Class, index: 0 },
				descr: CpRef { kind: CpKind::Descr, index: 0 },
			},
		])?;
		let class = pool.resolve(0, CpKind::Class)?;
		assert_eq!(pool.methods_of(class).len(), 2);
		assert!(pool.fields_of(class).is_empty());
		assert_eq!(pool.initializers_of(class)?, vec![pool.resolve(1, CpKind::Method)?]);
		assert_eq!(pool.member_descriptor(pool.resolve(0, CpKind::Method)?)?, JavaStr::from_str("()V"));
		Ok(())
	}
}
