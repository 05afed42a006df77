use std::fmt::{Display, Formatter};
use crate::{ByteCursor, CodingError};

const TWO_POW_32: u64 = 1 << 32;

/// A `(B, H, S, D)` coding.
///
/// Use [`Bhsd::checked`] to build one from untrusted parameters, the constants of this module
/// and [`canonical`](crate::canonical) for the predefined ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bhsd {
	b: u8,
	h: u16,
	s: u8,
	d: bool,
}

pub const BYTE1: Bhsd = Bhsd::new(1, 256, 0, false);
pub const CHAR3: Bhsd = Bhsd::new(3, 128, 0, false);
pub const BCI5: Bhsd = Bhsd::new(5, 4, 0, false);
pub const BRANCH5: Bhsd = Bhsd::new(5, 4, 2, false);
pub const UNSIGNED5: Bhsd = Bhsd::new(5, 64, 0, false);
pub const UDELTA5: Bhsd = Bhsd::new(5, 64, 0, true);
pub const SIGNED5: Bhsd = Bhsd::new(5, 64, 1, false);
pub const DELTA5: Bhsd = Bhsd::new(5, 64, 1, true);
pub const MDELTA5: Bhsd = Bhsd::new(5, 64, 2, true);

impl Bhsd {
	/// Doesn't check the parameters, only use this with known good values.
	pub(crate) const fn new(b: u8, h: u16, s: u8, d: bool) -> Bhsd {
		Bhsd { b, h, s, d }
	}

	/// Creates a coding, failing if `b` isn't in `1..=5`, `h` isn't in `1..=256` or `s` is bigger than `2`.
	///
	/// The `specifier` is only used for the error.
	pub fn checked(b: u8, h: u16, s: u8, d: bool, specifier: u32) -> Result<Bhsd, CodingError> {
		if !(1..=5).contains(&b) || !(1..=256).contains(&h) || s > 2 {
			return Err(CodingError::InvalidSpecifier { specifier });
		}
		Ok(Bhsd { b, h, s, d })
	}

	pub fn b(&self) -> u8 {
		self.b
	}

	pub fn h(&self) -> u16 {
		self.h
	}

	pub fn s(&self) -> u8 {
		self.s
	}

	pub fn is_delta(&self) -> bool {
		self.d
	}

	pub fn is_signed(&self) -> bool {
		self.s != 0
	}

	/// The number of byte values that end a value: `256 - H`.
	pub fn l(&self) -> u16 {
		256 - self.h
	}

	/// The number of distinct byte sequences this coding can produce.
	pub fn cardinality(&self) -> u64 {
		let b = self.b as u32;
		let h = self.h as u64;
		if h == 1 {
			b as u64 * 255 + 1
		} else {
			let l = self.l() as u64;
			let h_b = h.pow(b);
			l * (h_b - 1) / (h - 1) + h_b
		}
	}

	/// The biggest raw value that can be decoded without leaving the 32 bit range.
	fn max_raw(&self) -> u64 {
		self.cardinality().min(TWO_POW_32) - 1
	}

	fn full_range(&self) -> bool {
		self.cardinality() >= TWO_POW_32
	}

	/// The smallest value a sequence in this coding can decode to.
	pub fn smallest(&self) -> i64 {
		if self.d {
			if self.full_range() { i32::MIN as i64 } else { 0 }
		} else if self.s == 0 {
			0
		} else {
			// one negative value for every raw value with all sign bits set
			let mask = (1u64 << self.s) - 1;
			let max = self.max_raw();
			if max < mask {
				0
			} else {
				-(((max - mask) >> self.s) as i64) - 1
			}
		}
	}

	/// The largest value a sequence in this coding can decode to.
	pub fn largest(&self) -> i64 {
		if self.d {
			if self.full_range() { i32::MAX as i64 } else { self.cardinality() as i64 - 1 }
		} else if self.s == 0 {
			self.max_raw() as i64
		} else {
			let mask = (1u64 << self.s) - 1;
			let max = self.max_raw();
			let max = if max & mask == mask { max - 1 } else { max };
			(max - (max >> self.s)) as i64
		}
	}

	/// Whether the value is in the range of this coding.
	pub fn encodes(&self, value: i64) -> bool {
		self.smallest() <= value && value <= self.largest()
	}

	/// Reads the raw, unsigned value, of at most `B` bytes.
	fn read_raw(&self, source: &mut ByteCursor) -> Result<u64, CodingError> {
		let l = self.l() as u64;
		let h = self.h as u64;

		let mut z = 0u64;
		let mut power = 1u64;
		for _ in 0..self.b {
			let byte = source.read_u8()? as u64;
			z += byte * power;
			if byte < l {
				break;
			}
			power *= h;
		}

		if z >= TWO_POW_32 {
			return Err(CodingError::OutOfRange { position: source.position(), value: z });
		}
		Ok(z)
	}

	/// Decodes a single value, given the previous value of the band for delta codings.
	pub fn decode(&self, source: &mut ByteCursor, last: i64) -> Result<i64, CodingError> {
		let z = self.read_raw(source)?;

		let value = if self.s == 0 {
			z as i64
		} else {
			let mask = (1u64 << self.s) - 1;
			if z & mask == mask {
				!((z >> self.s) as i64)
			} else {
				(z - (z >> self.s)) as i64
			}
		};

		if self.d {
			Ok(self.wrap_delta(last + value))
		} else {
			Ok(value)
		}
	}

	/// Brings a sum of a delta and the previous value back into the range of the coding.
	fn wrap_delta(&self, value: i64) -> i64 {
		if self.full_range() {
			value as i32 as i64
		} else {
			value.rem_euclid(self.cardinality() as i64)
		}
	}

	/// Decodes `count` values, where the first one is relative to `last`.
	pub fn decode_values(&self, source: &mut ByteCursor, count: usize, mut last: i64) -> Result<Vec<i64>, CodingError> {
		let mut values = Vec::with_capacity(count);
		for _ in 0..count {
			last = self.decode(source, last)?;
			values.push(last);
		}
		Ok(values)
	}

	/// Encodes a single value, given the previous value of the band for delta codings.
	pub fn encode(&self, value: i64, last: i64, out: &mut Vec<u8>) -> Result<(), CodingError> {
		let unencodable = || CodingError::Unencodable { value, coding: *self };

		let mut v = value;
		if self.d {
			v = value.wrapping_sub(last);
			let plain = Bhsd { d: false, ..*self };
			if self.full_range() {
				v = v as i32 as i64;
				if v < plain.smallest() {
					v += TWO_POW_32 as i64;
				} else if v > plain.largest() {
					v -= TWO_POW_32 as i64;
				}
			} else {
				let cardinality = self.cardinality() as i64;
				v = v.rem_euclid(cardinality);
				if v > plain.largest() {
					v -= cardinality;
				}
			}
		}

		let z = if self.s == 0 {
			u64::try_from(v).map_err(|_| unencodable())?
		} else if v < 0 {
			((v.unsigned_abs()) << self.s) - 1
		} else if self.s == 1 {
			(v as u64) << 1
		} else {
			v as u64 + v as u64 / 3
		};
		if z > self.max_raw() {
			return Err(unencodable());
		}

		let l = self.l() as u64;
		let h = self.h as u64;
		let mut z = z;
		for n in 0..self.b {
			if n + 1 == self.b {
				let byte = u8::try_from(z).map_err(|_| unencodable())?;
				out.push(byte);
				break;
			}
			if z < l {
				out.push(z as u8);
				break;
			}
			let mut byte = z % h;
			while byte < l {
				byte += h;
			}
			out.push(byte as u8);
			z = (z - byte) / h;
		}
		Ok(())
	}

	/// Encodes all values in order, each relative to the one before it.
	pub fn encode_values(&self, values: &[i64], out: &mut Vec<u8>) -> Result<(), CodingError> {
		let mut last = 0;
		for &value in values {
			self.encode(value, last, out)?;
			last = value;
		}
		Ok(())
	}
}

impl Display for Bhsd {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "({},{}", self.b, self.h)?;
		if self.s != 0 || self.d {
			write!(f, ",{}", self.s)?;
		}
		if self.d {
			write!(f, ",1")?;
		}
		write!(f, ")")
	}
}
