//! The integer codings used by the pack200 transmission format.
//!
//! Every value in a pack200 segment is stored in some [`Coding`]. The basic building block is the
//! [`Bhsd`] coding, a variable length integer encoding described by four parameters:
//! - `B`: the maximum number of bytes per value,
//! - `H`: the radix of the continuation bytes (`L = 256 - H` bytes values terminate a value),
//! - `S`: how many low bits are used to store the sign,
//! - `D`: whether values are stored as a difference to the previous value.
//!
//! On top of that there are [run codings](Coding::Run) that switch coding after a number of values,
//! and [population codings](Coding::Population) that store a list of favoured values once and then
//! only refer to them by tokens.
//!
//! A single byte, the [coding specifier](Coding::from_specifier), selects one of the 115 canonical
//! codings, or starts one of the longer descriptions of the other codings.
//!
//! ```
//! use pack_coding::{ByteCursor, UNSIGNED5};
//!
//! let mut out = Vec::new();
//! UNSIGNED5.encode(1000, 0, &mut out).unwrap();
//! assert_eq!(out.len(), 2);
//!
//! let mut cursor = ByteCursor::new(&out);
//! assert_eq!(UNSIGNED5.decode(&mut cursor, 0).unwrap(), 1000);
//! assert_eq!(cursor.remaining(), 0);
//! ```
use std::fmt::{Display, Formatter};

mod bhsd;
mod canonical;
mod coding;
mod specifier;

pub use bhsd::{Bhsd, BYTE1, CHAR3, BCI5, BRANCH5, UNSIGNED5, UDELTA5, SIGNED5, DELTA5, MDELTA5};
pub use canonical::{canonical, specifier_of};
pub use coding::{Coding, TokenCoding};

/// An error from decoding or encoding values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodingError {
	/// The input ended while a value wasn't complete yet.
	Truncated { position: usize },
	/// A value that decoded to something not fitting into 32 bits.
	OutOfRange { position: usize, value: u64 },
	/// A coding specifier, or the parameters it describes, doesn't name a valid coding.
	InvalidSpecifier { specifier: u32 },
	/// A population coding token that doesn't select any favoured value.
	InvalidToken { token: i64, favoured: usize },
	/// A value that a coding can't represent.
	Unencodable { value: i64, coding: Bhsd },
}

impl Display for CodingError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			CodingError::Truncated { position } =>
				write!(f, "input ended in the middle of a value, at byte {position}"),
			CodingError::OutOfRange { position, value } =>
				write!(f, "value {value} ending before byte {position} doesn't fit into 32 bits"),
			CodingError::InvalidSpecifier { specifier } =>
				write!(f, "invalid coding specifier {specifier}"),
			CodingError::InvalidToken { token, favoured } =>
				write!(f, "population token {token} doesn't select one of the {favoured} favoured values"),
			CodingError::Unencodable { value, coding } =>
				write!(f, "value {value} can't be encoded with {coding}"),
		}
	}
}

impl std::error::Error for CodingError {}

/// A cursor over a byte slice, keeping track of how many bytes were consumed.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
	data: &'a [u8],
	position: usize,
}

impl<'a> ByteCursor<'a> {
	pub fn new(data: &'a [u8]) -> ByteCursor<'a> {
		ByteCursor { data, position: 0 }
	}

	/// The number of bytes consumed so far.
	pub fn position(&self) -> usize {
		self.position
	}

	pub fn remaining(&self) -> usize {
		self.data.len() - self.position
	}

	pub fn read_u8(&mut self) -> Result<u8, CodingError> {
		let byte = *self.data.get(self.position)
			.ok_or(CodingError::Truncated { position: self.position })?;
		self.position += 1;
		Ok(byte)
	}

	/// Takes the next `len` bytes.
	pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodingError> {
		let end = self.position.checked_add(len)
			.filter(|&end| end <= self.data.len())
			.ok_or(CodingError::Truncated { position: self.data.len() })?;
		let slice = &self.data[self.position..end];
		self.position = end;
		Ok(slice)
	}

	/// Splits off the next `len` bytes into their own cursor, advancing this one past them.
	pub fn split_off(&mut self, len: usize) -> Result<ByteCursor<'a>, CodingError> {
		self.read_slice(len).map(ByteCursor::new)
	}

	/// Makes the cursor end after the next `len` bytes, keeping positions the same.
	pub fn limit(&mut self, len: usize) -> Result<(), CodingError> {
		let end = self.position.checked_add(len)
			.filter(|&end| end <= self.data.len())
			.ok_or(CodingError::Truncated { position: self.data.len() })?;
		self.data = &self.data[..end];
		Ok(())
	}
}
