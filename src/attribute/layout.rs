//! The attribute layout language.
//!
//! A layout describes the contents of an attribute as a sequence of elements. Each integral and
//! reference element has a band of its own, and a replication or union element has a band for its
//! count or tag. All values of an element for all attributes using that layout are stored in its band.
//!
//! ```text
//! layout      = element* | callable+
//! callable    = '[' element* ']'
//! element     = integral | replication | union | call | reference
//! integral    = ('S' | 'P' | 'PO' | 'O' | 'OS' | 'F')? size
//! size        = 'B' | 'H' | 'I' | 'V'
//! replication = 'N' size '[' element* ']'
//! union       = 'T' 'S'? size ('(' tag (',' tag)* ')' '[' element* ']')* '(' ')' '[' element* ']'
//! tag         = '-'? digits ('-' '-'? digits)?
//! call        = '(' '-'? digits ')'
//! reference   = ('K' [IJFDSQ] | 'R' [CSDFMIUQ]) 'N'? size
//! ```

use anyhow::{anyhow, bail, Context, Result};
use pack_coding::{Bhsd, BCI5, BRANCH5, BYTE1, SIGNED5, UNSIGNED5};
use crate::cp::{ConstantPool, CpKind, CpRef};
use crate::DecodeError;
use crate::stream::{sum, to_length, BandReader};

/// How an integral value is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
	Unsigned,
	Signed,
	/// A byte code index, stored as an instruction index.
	Bci,
	/// A byte code index, stored as the number of instructions after the previous index.
	BciOffset,
	/// A number of bytes of code, stored as the number of instructions after the previous index.
	BciLength,
	Flag,
}

/// The kind of entry a reference element refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
	Int,
	Long,
	Float,
	Double,
	String,
	/// A constant whose kind depends on the descriptor of the field it's attached to.
	FieldConstant,
	Class,
	Signature,
	Descr,
	Field,
	Method,
	IMethod,
	Utf8,
	/// An entry of any kind.
	Any,
}

impl RefKind {
	fn cp_kind(self) -> Option<CpKind> {
		Some(match self {
			RefKind::Int => CpKind::Int,
			RefKind::Long => CpKind::Long,
			RefKind::Float => CpKind::Float,
			RefKind::Double => CpKind::Double,
			RefKind::String => CpKind::String,
			RefKind::Class => CpKind::Class,
			RefKind::Signature => CpKind::Signature,
			RefKind::Descr => CpKind::Descr,
			RefKind::Field => CpKind::Field,
			RefKind::Method => CpKind::Method,
			RefKind::IMethod => CpKind::IMethod,
			RefKind::Utf8 => CpKind::Utf8,
			RefKind::FieldConstant | RefKind::Any => return None,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Element {
	Integral { kind: IntKind, size: u8, band: usize },
	Reference { kind: RefKind, nullable: bool, size: u8, band: usize },
	Replication { size: u8, band: usize, body: Vec<Element> },
	Union { signed: bool, size: u8, band: usize, cases: Vec<UnionCase>, default: Vec<Element> },
	/// A call of the callable with that index.
	Call { callable: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnionCase {
	/// Inclusive ranges of tags selecting this case.
	tags: Vec<(i64, i64)>,
	body: Vec<Element>,
}

impl UnionCase {
	fn matches(&self, tag: i64) -> bool {
		self.tags.iter().any(|&(low, high)| low <= tag && tag <= high)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BandSpec {
	/// The part of the layout this band is for.
	pub(crate) text: String,
	pub(crate) coding: Bhsd,
}

/// A parsed attribute layout.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Layout {
	text: String,
	callables: Vec<Vec<Element>>,
	bands: Vec<BandSpec>,
	/// For each callable, whether it's called from itself or a callable after it.
	backward_called: Vec<bool>,
}

/// The band coding of a layout element, chosen by the letters in its text.
fn coding_of(text: &str) -> Bhsd {
	if text.contains('O') {
		BRANCH5
	} else if text.contains('P') {
		BCI5
	} else if text.contains('S') && !text.contains("KS") && !text.contains("RS") {
		SIGNED5
	} else if text.contains('B') {
		BYTE1
	} else {
		UNSIGNED5
	}
}

struct Parser<'a> {
	text: &'a str,
	position: usize,
	callable: usize,
	bands: Vec<BandSpec>,
	/// The relative calls with the callable they're in, resolved once all callables are known.
	calls: Vec<(usize, i64)>,
}

impl Parser<'_> {
	fn peek(&self) -> Option<u8> {
		self.text.as_bytes().get(self.position).copied()
	}

	fn next(&mut self) -> Result<u8> {
		let byte = self.peek()
			.with_context(|| anyhow!("layout ended unexpectedly"))?;
		self.position += 1;
		Ok(byte)
	}

	fn eat(&mut self, byte: u8) -> bool {
		if self.peek() == Some(byte) {
			self.position += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, byte: u8) -> Result<()> {
		let found = self.next()?;
		if found != byte {
			bail!("expected {:?} at {}, got {:?}", byte as char, self.position - 1, found as char);
		}
		Ok(())
	}

	fn size(&mut self) -> Result<u8> {
		Ok(match self.next()? {
			b'B' => 1,
			b'H' => 2,
			b'I' => 4,
			b'V' => 0,
			other => bail!("expected one of `BHIV` at {}, got {:?}", self.position - 1, other as char),
		})
	}

	fn number(&mut self) -> Result<i64> {
		let start = self.position;
		self.eat(b'-');
		while self.peek().is_some_and(|byte| byte.is_ascii_digit()) {
			self.position += 1;
		}
		let digits = &self.text[start..self.position];
		digits.parse()
			.with_context(|| anyhow!("invalid number {digits:?} at {start}"))
	}

	/// Adds the band for the element that started at `start` and ends here.
	fn band(&mut self, start: usize) -> usize {
		let text = self.text[start..self.position].to_owned();
		let coding = coding_of(&text);
		self.bands.push(BandSpec { text, coding });
		self.bands.len() - 1
	}

	/// Reads elements until `end`, or until the end of the layout if it's `None`.
	fn body(&mut self, end: Option<u8>) -> Result<Vec<Element>> {
		let mut elements = Vec::new();
		while self.peek() != end {
			elements.push(self.element()?);
		}
		Ok(elements)
	}

	fn bracketed_body(&mut self) -> Result<Vec<Element>> {
		self.expect(b'[')?;
		let body = self.body(Some(b']'))?;
		self.expect(b']')?;
		Ok(body)
	}

	fn element(&mut self) -> Result<Element> {
		let start = self.position;
		Ok(match self.next()? {
			b'B' | b'H' | b'I' | b'V' => {
				self.position -= 1;
				let size = self.size()?;
				Element::Integral { kind: IntKind::Unsigned, size, band: self.band(start) }
			},
			b'S' => {
				let size = self.size()?;
				Element::Integral { kind: IntKind::Signed, size, band: self.band(start) }
			},
			b'P' => {
				let kind = if self.eat(b'O') { IntKind::BciOffset } else { IntKind::Bci };
				let size = self.size()?;
				Element::Integral { kind, size, band: self.band(start) }
			},
			b'O' => {
				self.eat(b'S');
				let size = self.size()?;
				Element::Integral { kind: IntKind::BciLength, size, band: self.band(start) }
			},
			b'F' => {
				let size = self.size()?;
				Element::Integral { kind: IntKind::Flag, size, band: self.band(start) }
			},
			b'N' => {
				let size = self.size()?;
				let band = self.band(start);
				let body = self.bracketed_body()?;
				Element::Replication { size, band, body }
			},
			b'T' => {
				let signed = self.eat(b'S');
				let size = self.size()?;
				let band = self.band(start);
				let mut cases = Vec::new();
				loop {
					self.expect(b'(')?;
					if self.eat(b')') {
						let default = self.bracketed_body()?;
						break Element::Union { signed, size, band, cases, default };
					}
					let mut tags = Vec::new();
					loop {
						let low = self.number()?;
						let high = if self.eat(b'-') { self.number()? } else { low };
						tags.push((low, high));
						if !self.eat(b',') {
							break;
						}
					}
					self.expect(b')')?;
					let body = self.bracketed_body()?;
					cases.push(UnionCase { tags, body });
				}
			},
			b'(' => {
				let offset = self.number()?;
				self.expect(b')')?;
				let index = self.calls.len();
				self.calls.push((self.callable, offset));
				// the real index is filled in once all callables are parsed
				Element::Call { callable: index }
			},
			b'K' | b'R' => {
				let kind = match (self.text.as_bytes()[start], self.next()?) {
					(b'K', b'I') => RefKind::Int,
					(b'K', b'J') => RefKind::Long,
					(b'K', b'F') => RefKind::Float,
					(b'K', b'D') => RefKind::Double,
					(b'K', b'S') => RefKind::String,
					(b'K', b'Q') => RefKind::FieldConstant,
					(b'R', b'C') => RefKind::Class,
					(b'R', b'S') => RefKind::Signature,
					(b'R', b'D') => RefKind::Descr,
					(b'R', b'F') => RefKind::Field,
					(b'R', b'M') => RefKind::Method,
					(b'R', b'I') => RefKind::IMethod,
					(b'R', b'U') => RefKind::Utf8,
					(b'R', b'Q') => RefKind::Any,
					(a, b) => bail!("unknown reference kind `{}{}` at {start}", a as char, b as char),
				};
				let nullable = self.eat(b'N');
				let size = self.size()?;
				Element::Reference { kind, nullable, size, band: self.band(start) }
			},
			other => bail!("unexpected {:?} at {start}", other as char),
		})
	}
}

fn resolve_calls(elements: &mut [Element], targets: &[usize]) {
	for element in elements {
		match element {
			Element::Call { callable } => *callable = targets[*callable],
			Element::Replication { body, .. } => resolve_calls(body, targets),
			Element::Union { cases, default, .. } => {
				for case in cases {
					resolve_calls(&mut case.body, targets);
				}
				resolve_calls(default, targets);
			},
			_ => {},
		}
	}
}

impl Layout {
	pub(crate) fn parse(text: &str) -> Result<Layout> {
		Layout::parse_inner(text)
			.map_err(|error| anyhow!(DecodeError::format(format!("invalid attribute layout {text:?}: {error}"))))
	}

	fn parse_inner(text: &str) -> Result<Layout> {
		let mut parser = Parser { text, position: 0, callable: 0, bands: Vec::new(), calls: Vec::new() };
		let mut callables = Vec::new();
		if parser.peek() == Some(b'[') {
			while parser.peek().is_some() {
				parser.callable = callables.len();
				callables.push(parser.bracketed_body()?);
			}
		} else {
			callables.push(parser.body(None)?);
		}

		let mut backward_called = vec![false; callables.len()];
		let mut targets = Vec::with_capacity(parser.calls.len());
		for &(from, offset) in &parser.calls {
			let target = from as i64 + offset;
			let Some(target) = usize::try_from(target).ok().filter(|&target| target < callables.len()) else {
				bail!("call ({offset}) from callable {from} has no target");
			};
			if target <= from {
				backward_called[target] = true;
			}
			targets.push(target);
		}
		for callable in &mut callables {
			resolve_calls(callable, &targets);
		}

		Ok(Layout { text: text.to_owned(), callables, bands: parser.bands, backward_called })
	}

	pub(crate) fn text(&self) -> &str {
		&self.text
	}

	/// The number of callables that are called from themselves or a callable after them.
	///
	/// The number of such calls can't be known before reading the bands, so it's stored in a band.
	pub(crate) fn backward_callables(&self) -> usize {
		self.backward_called.iter().filter(|&&called| called).count()
	}
}

/// The bands of one layout, for all its attributes.
pub(crate) struct LayoutBands {
	values: Vec<Vec<i64>>,
	cursors: Vec<usize>,
}

struct BandsReader<'l, 'r, 'a> {
	layout: &'l Layout,
	reader: &'r mut BandReader<'a>,
	name: &'l str,
	values: Vec<Option<Vec<i64>>>,
	callable_counts: Vec<usize>,
}

impl BandsReader<'_, '_, '_> {
	fn band(&mut self, band: usize, count: usize) -> Result<&[i64]> {
		let spec = &self.layout.bands[band];
		let values = self.reader.band(&format!("{} {}", self.name, spec.text), spec.coding, count)?;
		let values = self.values[band].insert(values);
		Ok(values.as_slice())
	}

	fn read(&mut self, elements: &[Element], count: usize) -> Result<()> {
		for element in elements {
			match element {
				Element::Integral { band, .. } | Element::Reference { band, .. } => {
					self.band(*band, count)?;
				},
				Element::Replication { band, body, .. } => {
					let name = format!("{} {}", self.name, self.layout.bands[*band].text);
					let counts = self.band(*band, count)?
						.iter()
						.map(|&value| to_length(&name, value))
						.collect::<Result<Vec<_>>>()?;
					let total = sum(&name, &counts)?;
					self.read(body, total)?;
				},
				Element::Union { band, cases, default, .. } => {
					// a tag selects the first case it matches
					let mut counts = vec![0; cases.len()];
					let mut default_count = 0;
					for &tag in self.band(*band, count)?.iter() {
						match cases.iter().position(|case| case.matches(tag)) {
							Some(case) => counts[case] += 1,
							None => default_count += 1,
						}
					}
					for (case, count) in cases.iter().zip(counts) {
						self.read(&case.body, count)?;
					}
					self.read(default, default_count)?;
				},
				Element::Call { callable } => {
					self.callable_counts[*callable] += count;
				},
			}
		}
		Ok(())
	}
}

impl LayoutBands {
	/// Reads the bands for `count` attributes of the layout.
	///
	/// `backward_calls` has the number of calls for each backward called callable.
	pub(crate) fn read(reader: &mut BandReader, name: &str, layout: &Layout, count: usize, backward_calls: &[usize]) -> Result<LayoutBands> {
		let mut callable_counts = vec![0; layout.callables.len()];
		callable_counts[0] = count;
		let backward: Vec<usize> = (0..layout.callables.len()).filter(|&i| layout.backward_called[i]).collect();
		if backward.len() != backward_calls.len() {
			bail!(DecodeError::band_length(name, format!(
				"layout has {} backward called callables, but got {} call counts", backward.len(), backward_calls.len(),
			)));
		}
		for (&callable, &calls) in backward.iter().zip(backward_calls) {
			callable_counts[callable] += calls;
		}

		let mut bands = BandsReader {
			layout,
			reader,
			name,
			values: vec![None; layout.bands.len()],
			callable_counts,
		};
		for (i, callable) in layout.callables.iter().enumerate() {
			let count = bands.callable_counts[i];
			bands.read(callable, count)?;
		}

		// bands in unused union cases still get read, with a length of zero
		let values: Vec<Vec<i64>> = bands.values.into_iter().map(Option::unwrap_or_default).collect();
		let cursors = vec![0; values.len()];
		Ok(LayoutBands { values, cursors })
	}

	fn next(&mut self, name: &str, band: usize) -> Result<i64> {
		let cursor = &mut self.cursors[band];
		let Some(&value) = self.values[band].get(*cursor) else {
			bail!(DecodeError::band_length(name, format!("attribute band {band} ran out of values")));
		};
		*cursor += 1;
		Ok(value)
	}

	/// Gets the values of the next attribute, in the order of the layout.
	pub(crate) fn next_attribute(&mut self, name: &str, layout: &Layout) -> Result<Vec<LayoutValue>> {
		let mut out = Vec::new();
		self.walk(name, layout, &layout.callables[0], &mut out)?;
		Ok(out)
	}

	fn walk(&mut self, name: &str, layout: &Layout, elements: &[Element], out: &mut Vec<LayoutValue>) -> Result<()> {
		for element in elements {
			match element {
				&Element::Integral { kind, size, band } => {
					let value = self.next(name, band)?;
					out.push(LayoutValue::Int { kind, size, value });
				},
				&Element::Reference { kind, nullable, size, band } => {
					let value = self.next(name, band)?;
					out.push(LayoutValue::Ref { kind, nullable, size, value });
				},
				Element::Replication { size, band, body } => {
					let count = self.next(name, *band)?;
					out.push(LayoutValue::Int { kind: IntKind::Unsigned, size: *size, value: count });
					for _ in 0..count {
						self.walk(name, layout, body, out)?;
					}
				},
				Element::Union { signed, size, band, cases, default } => {
					let tag = self.next(name, *band)?;
					let kind = if *signed { IntKind::Signed } else { IntKind::Unsigned };
					out.push(LayoutValue::Int { kind, size: *size, value: tag });
					let body = cases.iter()
						.find(|case| case.matches(tag))
						.map_or(default, |case| &case.body);
					self.walk(name, layout, body, out)?;
				},
				Element::Call { callable } => {
					self.walk(name, layout, &layout.callables[*callable], out)?;
				},
			}
		}
		Ok(())
	}

	/// Checks that all values of all bands were used.
	pub(crate) fn finish(&self, name: &str) -> Result<()> {
		for (band, (values, &cursor)) in self.values.iter().zip(&self.cursors).enumerate() {
			if cursor != values.len() {
				bail!(DecodeError::band_length(name, format!(
					"attribute band {band} has {} values left over", values.len() - cursor,
				)));
			}
		}
		Ok(())
	}
}

/// A value of an attribute, as read from the bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LayoutValue {
	Int { kind: IntKind, size: u8, value: i64 },
	Ref { kind: RefKind, nullable: bool, size: u8, value: i64 },
}

/// A value of an attribute with its constant pool references resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
	Int { kind: IntKind, size: u8, value: i64 },
	Ref { size: u8, entry: Option<CpRef> },
}

impl LayoutValue {
	/// Resolves references, with `field_constant` being the kind of `KQ` references.
	pub(crate) fn resolve(self, pool: &ConstantPool, field_constant: Option<CpKind>) -> Result<Value> {
		Ok(match self {
			LayoutValue::Int { kind, size, value } => Value::Int { kind, size, value },
			LayoutValue::Ref { kind, nullable, size, value } => {
				let kind = match kind {
					RefKind::FieldConstant => Some(field_constant
						.with_context(|| anyhow!("`KQ` reference outside of a field with a constant type"))?),
					other => other.cp_kind(),
				};
				let entry = match (kind, nullable) {
					(Some(kind), true) => pool.resolve_nullable(value, kind)?,
					(Some(kind), false) => Some(pool.resolve(value, kind)?),
					(None, true) if value == 0 => None,
					(None, true) => Some(pool.resolve_any(value - 1)?),
					(None, false) => Some(pool.resolve_any(value)?),
				};
				Value::Ref { size, entry }
			},
		})
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pack_coding::{Bhsd, BCI5, BRANCH5, BYTE1, SIGNED5, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::attribute::layout::{coding_of, Element, IntKind, Layout, LayoutBands, LayoutValue, RefKind};
	use crate::stream::BandReader;

	#[test]
	fn codings() {
		assert_eq!(coding_of("PH"), BCI5);
		assert_eq!(coding_of("POH"), BRANCH5);
		assert_eq!(coding_of("OSH"), BRANCH5);
		assert_eq!(coding_of("SH"), SIGNED5);
		assert_eq!(coding_of("RSH"), UNSIGNED5);
		assert_eq!(coding_of("KSH"), UNSIGNED5);
		assert_eq!(coding_of("TB"), BYTE1);
		assert_eq!(coding_of("NH"), UNSIGNED5);
	}

	#[test]
	fn parse_simple() -> Result<()> {
		let layout = Layout::parse("NH[PHOHRUHRSHH]")?;
		assert_eq!(layout.callables.len(), 1);
		assert_eq!(layout.bands.iter().map(|band| band.text.as_str()).collect::<Vec<_>>(),
			vec!["NH", "PH", "OH", "RUH", "RSH", "H"]);
		assert_eq!(layout.callables[0], vec![Element::Replication { size: 2, band: 0, body: vec![
			Element::Integral { kind: IntKind::Bci, size: 2, band: 1 },
			Element::Integral { kind: IntKind::BciLength, size: 2, band: 2 },
			Element::Reference { kind: RefKind::Utf8, nullable: false, size: 2, band: 3 },
			Element::Reference { kind: RefKind::Signature, nullable: false, size: 2, band: 4 },
			Element::Integral { kind: IntKind::Unsigned, size: 2, band: 5 },
		] }]);
		assert_eq!(layout.backward_callables(), 0);

		assert_eq!(Layout::parse("")?.callables, vec![Vec::new()]);
		assert_eq!(Layout::parse("RUNH")?.callables[0], vec![
			Element::Reference { kind: RefKind::Utf8, nullable: true, size: 2, band: 0 },
		]);
		Ok(())
	}

	#[test]
	fn parse_callables() -> Result<()> {
		let layout = Layout::parse("[NH[(1)]][TB(1,2)[KIH](3-5)[(0)]()[]]")?;
		assert_eq!(layout.callables.len(), 2);
		assert_eq!(layout.callables[0], vec![Element::Replication { size: 2, band: 0, body: vec![
			Element::Call { callable: 1 },
		] }]);
		let Element::Union { cases, default, .. } = &layout.callables[1][0] else {
			panic!("expected a union");
		};
		assert_eq!(cases[0].tags, vec![(1, 1), (2, 2)]);
		assert_eq!(cases[1].tags, vec![(3, 5)]);
		assert_eq!(cases[1].body, vec![Element::Call { callable: 1 }]);
		assert_eq!(default, &Vec::new());
		assert_eq!(layout.backward_callables(), 1);
		Ok(())
	}

	#[test]
	fn parse_errors() {
		assert!(Layout::parse("X").is_err());
		assert!(Layout::parse("NH[H").is_err());
		assert!(Layout::parse("[H](1)").is_err());
		assert!(Layout::parse("[(2)]").is_err());
		assert!(Layout::parse("TB(1)[H]").is_err());
		assert!(Layout::parse("KXH").is_err());
	}

	fn encode(bands: &[(Bhsd, &[i64])]) -> Vec<u8> {
		let mut out = Vec::new();
		for (coding, values) in bands {
			coding.encode_values(values, &mut out).unwrap();
		}
		out
	}

	#[test]
	fn read_and_walk_replication() -> Result<()> {
		let layout = Layout::parse("NH[PHH]")?;
		// two attributes, with 2 and 1 entries
		let data = encode(&[
			(UNSIGNED5, &[2, 1]),
			(BCI5, &[0, 3, 7]),
			(UNSIGNED5, &[10, 11, 12]),
		]);
		let mut reader = BandReader::new(&data);
		let mut bands = LayoutBands::read(&mut reader, "LineNumberTable", &layout, 2, &[])?;
		assert_eq!(reader.remaining(), 0);

		let int = |kind, value| LayoutValue::Int { kind, size: 2, value };
		assert_eq!(bands.next_attribute("LineNumberTable", &layout)?, vec![
			int(IntKind::Unsigned, 2),
			int(IntKind::Bci, 0), int(IntKind::Unsigned, 10),
			int(IntKind::Bci, 3), int(IntKind::Unsigned, 11),
		]);
		assert_eq!(bands.next_attribute("LineNumberTable", &layout)?, vec![
			int(IntKind::Unsigned, 1),
			int(IntKind::Bci, 7), int(IntKind::Unsigned, 12),
		]);
		bands.finish("LineNumberTable")?;
		assert!(bands.next_attribute("LineNumberTable", &layout).is_err());
		Ok(())
	}

	#[test]
	fn read_and_walk_recursive_union() -> Result<()> {
		// a list of nested values: tag 1 is an int, tag 2 is a list of more values
		let layout = Layout::parse("[NH[(1)]][TB(1)[KIH](2)[NH[(0)]]()[]]")?;
		// one attribute: [ 1:int#4, 2:[ 1:int#5, 0 ] ]
		let data = encode(&[
			// callable 0: NH
			(UNSIGNED5, &[2]),
			// attr_calls would give 2 more backward calls to callable 1, the bands of callable 1:
			(BYTE1, &[1, 2, 1, 0]),
			(UNSIGNED5, &[4, 5]),
			(UNSIGNED5, &[2]),
		]);
		let mut reader = BandReader::new(&data);
		let mut bands = LayoutBands::read(&mut reader, "x", &layout, 1, &[2])?;
		assert_eq!(reader.remaining(), 0);

		let values = bands.next_attribute("x", &layout)?;
		let tag = |value| LayoutValue::Int { kind: IntKind::Unsigned, size: 1, value };
		let count = |value| LayoutValue::Int { kind: IntKind::Unsigned, size: 2, value };
		let int = |value| LayoutValue::Ref { kind: RefKind::Int, nullable: false, size: 2, value };
		assert_eq!(values, vec![
			count(2),
			tag(1), int(4),
			tag(2), count(2),
			tag(1), int(5),
			tag(0),
		]);
		bands.finish("x")
	}
}
