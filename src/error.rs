//! The ways decoding a segment can fail.
//!
//! All functions of this crate return [`anyhow::Result`], with context added on the way up. The root
//! cause of a failure caused by bad input is always one of the [`DecodeError`] variants, use
//! [`DecodeError::find`] to get it back.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use pack_coding::CodingError;

/// A corruption of the input detected while decoding a segment.
///
/// Any of these ends the decoding of the whole segment.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
	/// The bytes of a band can't be decoded with the coding the band is stored in.
	MalformedCodec { band: String, source: CodingError },
	/// A count used to size other bands is negative, or doesn't agree with the data.
	BandLength { band: String, message: String },
	/// An index into the constant pool, or into a table of byte code offsets, that is out of range
	/// or refers to an entry of the wrong kind.
	UnresolvedReference { index: i64, expected: String, message: String },
	/// A branch or switch target outside the instructions of the method, or an offset that doesn't
	/// fit the instruction.
	BranchFixup { instruction: usize, target: i64, message: String },
	/// One of the cursors of the annotation bands ran out of values.
	MetadataCursorExhaustion { band: String, needed: usize },
	/// Any other violation of the format, like a wrong magic number or an unknown opcode.
	Format(String),
}

impl DecodeError {
	pub fn band_length(band: impl Into<String>, message: impl Into<String>) -> DecodeError {
		DecodeError::BandLength { band: band.into(), message: message.into() }
	}

	pub fn format(message: impl Into<String>) -> DecodeError {
		DecodeError::Format(message.into())
	}

	/// Finds the [`DecodeError`] that caused an error, looking through all the context added to it.
	pub fn find(error: &anyhow::Error) -> Option<&DecodeError> {
		error.chain().find_map(|cause| cause.downcast_ref::<DecodeError>())
	}
}

impl Display for DecodeError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			DecodeError::MalformedCodec { band, source } =>
				write!(f, "malformed coding in band `{band}`: {source}"),
			DecodeError::BandLength { band, message } =>
				write!(f, "bad length for band `{band}`: {message}"),
			DecodeError::UnresolvedReference { index, expected, message } =>
				write!(f, "unresolved reference {index} to {expected}: {message}"),
			DecodeError::BranchFixup { instruction, target, message } =>
				write!(f, "can't fix up branch of instruction {instruction} to {target}: {message}"),
			DecodeError::MetadataCursorExhaustion { band, needed } =>
				write!(f, "annotation band `{band}` ran out of values, needed value number {needed}"),
			DecodeError::Format(message) =>
				write!(f, "format error: {message}"),
		}
	}
}

impl StdError for DecodeError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		match self {
			DecodeError::MalformedCodec { source, .. } => Some(source),
			_ => None,
		}
	}
}

#[cfg(test)]
mod testing {
	use anyhow::{anyhow, bail, Context, Result};
	use pretty_assertions::assert_eq;
	use crate::DecodeError;

	fn fails() -> Result<()> {
		bail!(DecodeError::format("bad magic"))
	}

	#[test]
	fn find_through_context() {
		let error = fails()
			.with_context(|| anyhow!("failed to read header"))
			.with_context(|| anyhow!("failed to read segment"))
			.unwrap_err();

		assert_eq!(DecodeError::find(&error), Some(&DecodeError::Format("bad magic".to_owned())));
		assert_eq!(DecodeError::find(&anyhow!("something else")), None);
	}
}
