//! This crate contains a direct band-level representation of a pack200 segment.
//!
//! A [`Segment`] is the segment header with all its counts, followed by the bands in the order they
//! are stored in. No format checking is done when creating a `Vec<u8>`: the counts in the header
//! aren't checked against the bands, and the bands aren't checked against each other. Empty bands
//! take up no bytes at all, so they can be left out.
//!
//! Bands whose first value would be read as the start of a coding escape are written escaped to their
//! own coding, just like a packer has to.
//!
//! ```
//! use pack_coding::UDELTA5;
//! use raw_segment::{utf8_bands, Band, CpCounts, Segment};
//!
//! // a segment with the strings "" and "Foo" and one class entry, but no classes
//! let mut bands = utf8_bands(&["", "Foo"]);
//! bands.push(Band::new("cp_Class", UDELTA5, vec![1]));
//!
//! let segment = Segment {
//! 	cp: CpCounts { utf8: 2, class: 1, ..CpCounts::default() },
//! 	bands,
//! 	..Segment::default()
//! };
//! let bytes = segment.to_bytes();
//! assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xd0, 0x0d]);
//! ```

use pack_coding::{specifier_of, Bhsd, CHAR3, DELTA5, UNSIGNED5};

pub const MAGIC: [u8; 4] = [0xca, 0xfe, 0xd0, 0x0d];

pub mod options {
	pub const HAVE_SPECIAL_FORMATS: u32 = 1 << 0;
	pub const HAVE_CP_NUMBERS: u32      = 1 << 1;
	pub const HAVE_ALL_CODE_FLAGS: u32  = 1 << 2;
	pub const HAVE_CP_EXTRAS: u32       = 1 << 3;
	pub const HAVE_FILE_HEADERS: u32    = 1 << 4;
	pub const DEFLATE_HINT: u32         = 1 << 5;
	pub const HAVE_FILE_MODTIME: u32    = 1 << 6;
	pub const HAVE_FILE_OPTIONS: u32    = 1 << 7;
	pub const HAVE_FILE_SIZE_HI: u32    = 1 << 8;
	pub const HAVE_CLASS_FLAGS_HI: u32  = 1 << 9;
	pub const HAVE_FIELD_FLAGS_HI: u32  = 1 << 10;
	pub const HAVE_METHOD_FLAGS_HI: u32 = 1 << 11;
	pub const HAVE_CODE_FLAGS_HI: u32   = 1 << 12;
}

/// The archive part of the header, written if [`options::HAVE_FILE_HEADERS`] is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveHeader {
	/// The number of bytes after the size, computed from the rest of the segment if not given.
	pub size: Option<u64>,
	pub next_count: u32,
	pub modtime: u32,
	pub file_count: u32,
}

/// The number of constant pool entries of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpCounts {
	pub utf8: u32,
	/// Written if [`options::HAVE_CP_NUMBERS`] is set, like the next three.
	pub int: u32,
	pub float: u32,
	pub long: u32,
	pub double: u32,
	pub string: u32,
	pub class: u32,
	pub signature: u32,
	pub descr: u32,
	pub field: u32,
	pub method: u32,
	pub imethod: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
	pub minor_version: u32,
	pub major_version: u32,
	pub options: u32,
	pub archive: ArchiveHeader,
	/// The band headers, their size and the attribute definition count are only written if
	/// [`options::HAVE_SPECIAL_FORMATS`] is set.
	pub band_headers: Vec<u8>,
	pub attr_definition_count: u32,
	pub cp: CpCounts,
	pub ic_count: u32,
	pub default_class_minor_version: u32,
	pub default_class_major_version: u32,
	pub class_count: u32,
	pub bands: Vec<Band>,
}

impl Default for Segment {
	fn default() -> Segment {
		Segment {
			minor_version: 7,
			major_version: 150,
			options: 0,
			archive: ArchiveHeader::default(),
			band_headers: Vec::new(),
			attr_definition_count: 0,
			cp: CpCounts::default(),
			ic_count: 0,
			default_class_minor_version: 0,
			default_class_major_version: 49,
			class_count: 0,
			bands: Vec::new(),
		}
	}
}

/// One band of a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Band {
	/// Values written with the default coding of the band.
	Values { name: &'static str, coding: Bhsd, values: Vec<i64> },
	/// Values written with another coding, selected by an escape written with the default coding.
	Escaped { name: &'static str, default: Bhsd, coding: Bhsd, values: Vec<i64> },
	/// Bytes written as they are, like `bc_codes` or the file contents.
	Bytes { name: &'static str, bytes: Vec<u8> },
}

impl Band {
	pub fn new(name: &'static str, coding: Bhsd, values: Vec<i64>) -> Band {
		Band::Values { name, coding, values }
	}

	pub fn bytes(name: &'static str, bytes: Vec<u8>) -> Band {
		Band::Bytes { name, bytes }
	}

	fn write(&self, out: &mut Vec<u8>) {
		match self {
			Band::Values { name, coding, values } => {
				match values.first() {
					Some(&first) if is_escape(*coding, first) => write_escaped(name, *coding, *coding, values, out),
					_ => write_values(name, *coding, values, out),
				}
			},
			Band::Escaped { name, default, coding, values } => write_escaped(name, *default, *coding, values, out),
			Band::Bytes { bytes, .. } => out.extend_from_slice(bytes),
		}
	}
}

/// Whether the first value of a band would be read as a coding escape.
fn is_escape(coding: Bhsd, first: i64) -> bool {
	if coding.b() == 1 || coding.l() == 0 {
		false
	} else if coding.is_signed() {
		coding.smallest() <= -256 && (-256..=-1).contains(&first)
	} else {
		let l = coding.l() as i64;
		coding.largest() >= l + 255 && (l..=l + 255).contains(&first)
	}
}

fn write_values(name: &str, coding: Bhsd, values: &[i64], out: &mut Vec<u8>) {
	if let Err(e) = coding.encode_values(values, out) {
		panic!("can't write band {name} with coding {coding}: {e}");
	}
}

fn write_escaped(name: &str, default: Bhsd, coding: Bhsd, values: &[i64], out: &mut Vec<u8>) {
	let Some(specifier) = specifier_of(coding) else {
		panic!("coding {coding} of band {name} isn't a canonical coding");
	};
	let escape = if default.is_signed() {
		-1 - specifier as i64
	} else {
		default.l() as i64 + specifier as i64
	};
	write_values(name, default, &[escape], out);
	write_values(name, coding, values, out);
}

impl Segment {
	/// Converts the segment to its binary representation.
	pub fn to_bytes(&self) -> Vec<u8> {
		let has = |bit: u32| self.options & bit != 0;

		let mut tail = Vec::new();
		if has(options::HAVE_FILE_HEADERS) {
			scalars(&mut tail, &[self.archive.next_count, self.archive.modtime, self.archive.file_count]);
		}
		if has(options::HAVE_SPECIAL_FORMATS) {
			scalars(&mut tail, &[self.band_headers.len() as u32, self.attr_definition_count]);
		}
		let cp = &self.cp;
		scalars(&mut tail, &[cp.utf8]);
		if has(options::HAVE_CP_NUMBERS) {
			scalars(&mut tail, &[cp.int, cp.float, cp.long, cp.double]);
		}
		scalars(&mut tail, &[cp.string, cp.class, cp.signature, cp.descr, cp.field, cp.method, cp.imethod]);
		scalars(&mut tail, &[self.ic_count, self.default_class_minor_version, self.default_class_major_version, self.class_count]);
		if has(options::HAVE_SPECIAL_FORMATS) {
			tail.extend_from_slice(&self.band_headers);
		}
		for band in &self.bands {
			band.write(&mut tail);
		}

		let mut out = MAGIC.to_vec();
		scalars(&mut out, &[self.minor_version, self.major_version, self.options]);
		if has(options::HAVE_FILE_HEADERS) {
			let size = self.archive.size.unwrap_or(tail.len() as u64);
			scalars(&mut out, &[(size >> 32) as u32, size as u32]);
		}
		out.extend(tail);
		out
	}
}

fn scalars(out: &mut Vec<u8>, values: &[u32]) {
	for &value in values {
		write_values("header", UNSIGNED5, &[value as i64], out);
	}
}

/// The bands of the `Utf8` entries.
///
/// The first string should be the empty one, it isn't stored. Each string shares as many UTF-16 code
/// units as possible with the one before it, and the rest is stored in `cp_Utf8_chars`. A string
/// with nothing left after the shared part gets a band of its own.
pub fn utf8_bands(strings: &[&str]) -> Vec<Band> {
	let units: Vec<Vec<u16>> = strings.iter()
		.map(|string| string.encode_utf16().collect())
		.collect();

	let mut prefixes = Vec::new();
	let mut suffixes = Vec::new();
	let mut chars = Vec::new();
	let mut big_suffixes = Vec::new();
	for (i, string) in units.iter().enumerate().skip(1) {
		let prefix = if i == 1 {
			0
		} else {
			let previous = &units[i - 1];
			string.iter().zip(previous).take_while(|(a, b)| a == b).count()
		};
		if i > 1 {
			prefixes.push(prefix as i64);
		}
		let suffix = &string[prefix..];
		suffixes.push(suffix.len() as i64);
		if suffix.is_empty() {
			big_suffixes.push(0);
		}
		chars.extend(suffix.iter().map(|&unit| unit as i64));
	}

	vec![
		Band::new("cp_Utf8_prefix", DELTA5, prefixes),
		Band::new("cp_Utf8_suffix", UNSIGNED5, suffixes),
		Band::new("cp_Utf8_chars", CHAR3, chars),
		// the big strings are all empty, so they have no cp_Utf8_big_chars
		Band::new("cp_Utf8_big_suffix", DELTA5, big_suffixes),
	]
}

#[cfg(test)]
mod testing {
	use pack_coding::{specifier_of, ByteCursor, BYTE1, DELTA5, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::{is_escape, options, ArchiveHeader, Band, Segment};

	#[test]
	fn escape_ranges() {
		assert!(is_escape(UNSIGNED5, 192));
		assert!(is_escape(UNSIGNED5, 447));
		assert!(!is_escape(UNSIGNED5, 191));
		assert!(!is_escape(UNSIGNED5, 448));
		assert!(is_escape(DELTA5, -1));
		assert!(!is_escape(DELTA5, 1));
		assert!(!is_escape(BYTE1, 200));
	}

	#[test]
	fn first_value_in_escape_range() {
		let mut out = Vec::new();
		Band::new("test", UNSIGNED5, vec![300, 1]).write(&mut out);

		let mut cursor = ByteCursor::new(&out);
		let specifier = specifier_of(UNSIGNED5).unwrap() as i64;
		assert_eq!(UNSIGNED5.decode(&mut cursor, 0).unwrap(), 192 + specifier);
		assert_eq!(UNSIGNED5.decode_values(&mut cursor, 2, 0).unwrap(), vec![300, 1]);
		assert_eq!(cursor.remaining(), 0);
	}

	#[test]
	fn archive_size() {
		let segment = Segment {
			options: options::HAVE_FILE_HEADERS,
			archive: ArchiveHeader { file_count: 1, ..ArchiveHeader::default() },
			bands: vec![Band::bytes("file_bits", vec![1, 2, 3])],
			..Segment::default()
		};
		let bytes = segment.to_bytes();

		let mut cursor = ByteCursor::new(&bytes[4..]);
		let header = UNSIGNED5.decode_values(&mut cursor, 5, 0).unwrap();
		assert_eq!(header[..3], [7, 150, options::HAVE_FILE_HEADERS as i64]);
		assert_eq!(header[3], 0);
		assert_eq!(header[4] as usize, cursor.remaining());
		assert_eq!(&bytes[bytes.len() - 3..], &[1, 2, 3]);
	}
}
