//! Methods for converting the UTF-16 code units of the constant pool bands into [`JavaString`]s.
//!
//! The bands store strings as UTF-16 code units, and they don't need to be valid UTF-16: unpaired
//! surrogates are allowed, just like in class files. The units are converted to the modified UTF-8
//! format used in the Java Virtual Machine Specification, and read from there.
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7> for the complete specification of
//! the string format used in the Java Virtual Machine Specification.

use anyhow::{anyhow, Context, Result};
use java_string::JavaString;

/// Converts code units into the modified UTF-8 format, where a surrogate pair is written as two
/// separate three byte sequences and `\0` is written using two bytes.
fn to_modified_utf8(units: &[u16]) -> Vec<u8> {
	let mut vec = Vec::with_capacity(units.len());
	for &unit in units {
		match unit {
			0x0001..=0x007f => vec.push(unit as u8),
			0x0000 | 0x0080..=0x07ff => {
				vec.push(0b1100_0000 | (unit >> 6) as u8);
				vec.push(0b1000_0000 | (unit & 0b11_1111) as u8);
			},
			_ => {
				vec.push(0b1110_0000 | (unit >> 12) as u8);
				vec.push(0b1000_0000 | ((unit >> 6) & 0b11_1111) as u8);
				vec.push(0b1000_0000 | (unit & 0b11_1111) as u8);
			},
		}
	}
	vec
}

/// Takes in UTF-16 code units, tries to read them into a [`JavaString`].
pub(crate) fn from_utf16_units(units: &[u16]) -> Result<JavaString> {
	JavaString::from_modified_utf8(to_modified_utf8(units))
		.with_context(|| anyhow!("invalid java string contents {units:x?}"))
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::jstring::{from_utf16_units, to_modified_utf8};

	fn round_trip(units: &[u16], raw: &[u8], string: &str) -> Result<()> {
		assert_eq!(to_modified_utf8(units), raw);
		assert_eq!(from_utf16_units(units)?, JavaStr::from_str(string));
		Ok(())
	}

	#[test]
	fn zero() -> Result<()> {
		round_trip(&[0, 0], &[0b1100_0000, 0b1000_0000, 0b1100_0000, 0b1000_0000], "\0\0")
	}

	#[test]
	fn one_byte() -> Result<()> {
		round_trip(&[0x4c, 0x61, 0x3b], b"La;", "La;")
	}

	#[test]
	fn two_and_three_bytes() -> Result<()> {
		round_trip(&[0x0080, 0x07ff, 0x20ac], &[
			0b1100_0010, 0b1000_0000,
			0b1101_1111, 0b1011_1111,
			0b1110_0010, 0b1000_0010, 0b1010_1100,
		], "\u{0080}\u{07ff}\u{20ac}")
	}

	#[test]
	fn surrogate_pair() -> Result<()> {
		round_trip(&[0xd83d, 0xde00], &[0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80], "\u{1f600}")
	}

	#[test]
	fn unpaired_surrogate() -> Result<()> {
		let string = from_utf16_units(&[0x61, 0xd800])?;
		assert_eq!(&*string.to_modified_utf8(), &[0x61, 0xed, 0xa0, 0x80][..]);
		Ok(())
	}
}
