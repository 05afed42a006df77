//! What the decoder needs to know about field and method descriptors.

use anyhow::{bail, Result};
use java_string::JavaStr;
use crate::cp::CpKind;
use crate::DecodeError;

/// The kind of constant a `ConstantValue` attribute of a field with the given descriptor refers to.
pub(crate) fn constant_kind(descriptor: &JavaStr) -> Option<CpKind> {
	match descriptor.as_bytes() {
		b"I" | b"S" | b"B" | b"C" | b"Z" => Some(CpKind::Int),
		b"J" => Some(CpKind::Long),
		b"F" => Some(CpKind::Float),
		b"D" => Some(CpKind::Double),
		b"Ljava/lang/String;" => Some(CpKind::String),
		_ => None,
	}
}

/// The number of local variable slots the arguments of a method descriptor take up.
///
/// `long` and `double` take two slots, everything else one. The receiver isn't included.
pub(crate) fn argument_slots(descriptor: &JavaStr) -> Result<u16> {
	let bytes = descriptor.as_bytes();
	let Some(b'(') = bytes.first() else {
		bail!(DecodeError::format(format!("method descriptor {descriptor:?} doesn't start with `(`")));
	};

	let mut slots = 0u16;
	let mut i = 1;
	loop {
		let Some(&b) = bytes.get(i) else {
			bail!(DecodeError::format(format!("method descriptor {descriptor:?} has no `)`")));
		};
		match b {
			b')' => return Ok(slots),
			b'J' | b'D' => {
				slots += 2;
				i += 1;
			},
			b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' => {
				slots += 1;
				i += 1;
			},
			b'L' | b'[' => {
				while bytes.get(i) == Some(&b'[') {
					i += 1;
				}
				if bytes.get(i) == Some(&b'L') {
					match bytes[i..].iter().position(|&b| b == b';') {
						Some(end) => i += end + 1,
						None => bail!(DecodeError::format(format!("unterminated class name in method descriptor {descriptor:?}"))),
					}
				} else {
					i += 1;
				}
				slots += 1;
			},
			_ => bail!(DecodeError::format(format!("invalid character {:?} in method descriptor {descriptor:?}", b as char))),
		}
	}
}
