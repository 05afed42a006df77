//! Reading bands from the input.
//!
//! All bands of a segment are stored one after the other, without any markers in between. A band
//! is read given its default coding and its length. Except for single byte codings, the first
//! value of a band may instead select another coding for the whole band, see [`BandReader::band`].

use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use pack_coding::{Bhsd, ByteCursor, Coding, CodingError};
use crate::DecodeError;

pub(crate) struct BandReader<'a> {
	input: ByteCursor<'a>,
	headers: ByteCursor<'a>,
}

impl<'a> BandReader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> BandReader<'a> {
		BandReader {
			input: ByteCursor::new(data),
			headers: ByteCursor::new(&[]),
		}
	}

	/// The number of bytes read so far.
	pub(crate) fn position(&self) -> usize {
		self.input.position()
	}

	pub(crate) fn remaining(&self) -> usize {
		self.input.remaining()
	}

	/// Makes the input end after the next `len` bytes.
	pub(crate) fn limit(&mut self, len: u64) -> Result<()> {
		let len = usize::try_from(len)
			.with_context(|| anyhow!("archive size {len} doesn't fit into memory"))?;
		self.input.limit(len)
			.map_err(|source| malformed("archive_size", source))?;
		Ok(())
	}

	/// Sets the bytes from which the codings of escaped bands are read.
	pub(crate) fn set_band_headers(&mut self, headers: &'a [u8]) {
		self.headers = ByteCursor::new(headers);
	}

	/// The number of band header bytes no band used.
	pub(crate) fn unused_band_headers(&self) -> usize {
		self.headers.remaining()
	}

	/// Reads a single value that can't be escaped, like the fields of the segment header.
	pub(crate) fn scalar(&mut self, name: &str, coding: Bhsd) -> Result<i64> {
		let value = coding.decode(&mut self.input, 0)
			.map_err(|source| malformed(name, source))?;
		trace!("{name} = {value}");
		Ok(value)
	}

	/// Reads a single value that must be a count.
	pub(crate) fn scalar_count(&mut self, name: &str, coding: Bhsd) -> Result<usize> {
		let value = self.scalar(name, coding)?;
		to_length(name, value)
	}

	/// Reads `count` values of a band.
	///
	/// If the `default` coding uses more than one byte, and its first value lies in the escape range,
	/// that value selects the coding actually used for the band. For signed codings the escape range is
	/// `-256..=-1`, for unsigned ones it's `L..=L+255`, and the coding specifier is the distance to the
	/// start of that range. Only codings that can represent the escape range have one.
	pub(crate) fn band(&mut self, name: &str, default: Bhsd, count: usize) -> Result<Vec<i64>> {
		let start = self.input.position();
		let (values, coding) = self.decode_band(default, count)
			.map_err(|source| malformed(name, source))?;
		trace!("{name}: {count} values in {} bytes, {coding}", self.input.position() - start);
		Ok(values)
	}

	fn decode_band(&mut self, default: Bhsd, count: usize) -> Result<(Vec<i64>, String), CodingError> {
		if count > 0 && default.b() > 1 {
			let mut lookahead = self.input.clone();
			let first = default.decode(&mut lookahead, 0)?;
			if let Some(specifier) = escape(default, first) {
				self.input = lookahead;
				let coding = Coding::from_specifier(specifier, &default.into(), &mut self.headers)?;
				let values = coding.decode_values(&mut self.input, count)?;
				return Ok((values, format!("escaped to {coding:?}")));
			}
		}
		// not escaped: the first value is just the first value of the band
		let values = default.decode_values(&mut self.input, count, 0)?;
		Ok((values, default.to_string()))
	}

	/// Reads a band whose values must all be counts.
	pub(crate) fn counts(&mut self, name: &str, default: Bhsd, count: usize) -> Result<Vec<usize>> {
		let values = self.band(name, default, count)?;
		lengths(name, &values)
	}

	pub(crate) fn bytes(&mut self, name: &str, len: usize) -> Result<&'a [u8]> {
		let bytes = self.input.read_slice(len)
			.map_err(|source| malformed(name, source))?;
		trace!("{name}: {len} raw bytes");
		Ok(bytes)
	}

	/// Reads the bytes up to the next `end` byte. The `end` byte is skipped, but not returned.
	pub(crate) fn bytes_until(&mut self, name: &str, end: u8) -> Result<&'a [u8]> {
		let mut lookahead = self.input.clone();
		let mut len = 0;
		while lookahead.read_slice(1).map_err(|source| malformed(name, source))? != [end] {
			len += 1;
		}
		let bytes = self.bytes(name, len)?;
		self.input = lookahead;
		Ok(bytes)
	}
}

fn escape(coding: Bhsd, first: i64) -> Option<u8> {
	if coding.l() == 0 {
		return None;
	}
	if coding.is_signed() {
		if coding.smallest() <= -256 && (-256..=-1).contains(&first) {
			return u8::try_from(-1 - first).ok();
		}
	} else {
		let l = coding.l() as i64;
		if coding.largest() >= l + 255 && (l..=l + 255).contains(&first) {
			return u8::try_from(first - l).ok();
		}
	}
	None
}

fn malformed(band: &str, source: CodingError) -> DecodeError {
	DecodeError::MalformedCodec { band: band.to_owned(), source }
}

pub(crate) fn to_length(band: &str, value: i64) -> Result<usize> {
	match usize::try_from(value) {
		Ok(length) => Ok(length),
		Err(_) => bail!(DecodeError::band_length(band, format!("negative count {value}"))),
	}
}

/// Converts the values of a band into counts.
pub(crate) fn lengths(band: &str, values: &[i64]) -> Result<Vec<usize>> {
	values.iter()
		.map(|&value| to_length(band, value))
		.collect()
}

/// Sums up the counts of a band, giving the length of the band they size.
pub(crate) fn sum(band: &str, counts: &[usize]) -> Result<usize> {
	counts.iter()
		.try_fold(0usize, |sum, &count| sum.checked_add(count))
		.ok_or_else(|| anyhow!(DecodeError::band_length(band, "sum of counts overflows")))
}

/// Splits `values` into consecutive parts of the given lengths, which must add up exactly.
pub(crate) fn split<T: Clone>(band: &str, values: &[T], lengths: &[usize]) -> Result<Vec<Vec<T>>> {
	let mut rest = values;
	let mut parts = Vec::with_capacity(lengths.len());
	for &length in lengths {
		if length > rest.len() {
			bail!(DecodeError::band_length(band, format!("needed {length} more values, but only {} are left", rest.len())));
		}
		let (part, tail) = rest.split_at(length);
		parts.push(part.to_vec());
		rest = tail;
	}
	if !rest.is_empty() {
		bail!(DecodeError::band_length(band, format!("{} values left over", rest.len())));
	}
	Ok(parts)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pack_coding::{Bhsd, BYTE1, CodingError, DELTA5, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::DecodeError;
	use crate::stream::{lengths, split, BandReader};

	fn encode(coding: Bhsd, values: &[i64]) -> Vec<u8> {
		let mut out = Vec::new();
		coding.encode_values(values, &mut out).unwrap();
		out
	}

	#[test]
	fn plain_band() -> Result<()> {
		let mut data = encode(DELTA5, &[5, 3, 10]);
		data.push(0xff);
		let mut reader = BandReader::new(&data);
		assert_eq!(reader.band("test", DELTA5, 3)?, vec![5, 3, 10]);
		assert_eq!(reader.remaining(), 1);
		Ok(())
	}

	#[test]
	fn empty_band_reads_nothing() -> Result<()> {
		let data = [1];
		let mut reader = BandReader::new(&data);
		assert_eq!(reader.band("test", UNSIGNED5, 0)?, Vec::<i64>::new());
		assert_eq!(reader.position(), 0);
		Ok(())
	}

	#[test]
	fn signed_escape() -> Result<()> {
		// -1 - (-2) = 1, selecting BYTE1 for the band
		let mut data = encode(DELTA5, &[-2]);
		data.extend([200, 7, 0]);
		let mut reader = BandReader::new(&data);
		assert_eq!(reader.band("test", DELTA5, 3)?, vec![200, 7, 0]);
		assert_eq!(reader.remaining(), 0);
		Ok(())
	}

	#[test]
	fn unsigned_escape_with_band_headers() -> Result<()> {
		// L = 192 for UNSIGNED5, so 192 + 116 selects an arbitrary coding, described in the band headers
		let mut data = encode(UNSIGNED5, &[192 + 116]);
		data.extend([0x42, 0x43]);
		let headers = [0 << 3, 255]; // (1, 256), just like BYTE1
		let mut reader = BandReader::new(&data);
		reader.set_band_headers(&headers);
		assert_eq!(reader.band("test", UNSIGNED5, 2)?, vec![0x42, 0x43]);
		assert_eq!(reader.unused_band_headers(), 0);
		Ok(())
	}

	#[test]
	fn no_escape_for_single_byte_codings() -> Result<()> {
		let data = [255, 254];
		let mut reader = BandReader::new(&data);
		assert_eq!(reader.band("test", BYTE1, 2)?, vec![255, 254]);
		Ok(())
	}

	#[test]
	fn truncated_band() {
		let data = encode(UNSIGNED5, &[1, 2]);
		let mut reader = BandReader::new(&data);
		let error = reader.band("cp_Int", UNSIGNED5, 3).unwrap_err();
		assert_eq!(DecodeError::find(&error), Some(&DecodeError::MalformedCodec {
			band: "cp_Int".to_owned(),
			source: CodingError::Truncated { position: 2 },
		}));
	}

	#[test]
	fn bytes_up_to_marker() -> Result<()> {
		let data = [0x2a, 0xb1, 0xff, 0xff, 0x03];
		let mut reader = BandReader::new(&data);
		assert_eq!(reader.bytes_until("bc_codes", 0xff)?, &[0x2a, 0xb1]);
		assert!(reader.bytes_until("bc_codes", 0xff)?.is_empty());
		assert_eq!(reader.position(), 4);
		assert!(reader.bytes_until("bc_codes", 0xff).is_err());
		Ok(())
	}

	#[test]
	fn negative_lengths() {
		let error = lengths("class_field_count", &[1, -1]).unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::BandLength { .. })));
	}

	#[test]
	fn split_exactly() -> Result<()> {
		assert_eq!(split("x", &[1, 2, 3], &[2, 0, 1])?, vec![vec![1, 2], vec![], vec![3]]);
		assert!(split("x", &[1, 2, 3], &[2]).is_err());
		assert!(split("x", &[1, 2, 3], &[2, 2]).is_err());
		Ok(())
	}
}
