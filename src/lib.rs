//! Decoding of pack200 archives.
//!
//! A pack200 archive is made up of segments. Each segment stores the contents of many class files
//! split up into bands: sequences of integers of the same meaning, each compressed with its own
//! coding. Decoding reads all bands of a segment in their fixed order, resolving references into the
//! segment wide constant pool, and then puts each class back together.
//!
//! The result is a [`DecodedSegment`]: the [`class::ClassFile`]s with their instructions, attributes and
//! the constant pool entries they use, and the [`class::FileEntry`]s of the archive. Writing out the
//! class files as bytes isn't done here.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! let data = std::fs::read("some.pack")?;
//! for segment in unpack200::decode_archive(&data)? {
//! 	for file in &segment.files {
//! 		println!("{}", file.name);
//! 	}
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Context, Result};
use log::debug;
use crate::assemble::ClassAssembler;
use crate::class::{ClassFile, FileEntry};
use crate::cp::ConstantPool;
use crate::header::SegmentHeader;
use crate::segment::SegmentBands;

mod assemble;
mod attribute;
pub mod bytecode;
pub mod class;
pub mod cp;
mod descriptor;
mod error;
pub mod header;
pub mod ic;
mod jstring;
pub mod metadata;
pub mod pipeline;
mod segment;
mod stream;

pub use error::DecodeError;

/// A segment with all its classes put back together.
#[derive(Debug, Clone)]
pub struct DecodedSegment {
	pub header: SegmentHeader,
	/// The constant pool all references of the classes point into.
	pub pool: ConstantPool,
	pub classes: Vec<ClassFile>,
	pub files: Vec<FileEntry>,
	/// The number of bytes of the input this segment took up.
	pub bytes_consumed: usize,
}

/// Decodes the segment at the start of `data`.
///
/// If the segment doesn't give its size, it ends where its last band ends. Any corruption of the input
/// fails the whole segment, see [`DecodeError`].
pub fn decode_segment(data: &[u8]) -> Result<DecodedSegment> {
	let bands = SegmentBands::read(data)?;

	let assembler = ClassAssembler::new(&bands);
	let classes = (0..bands.classes.len())
		.map(|index| assembler.assemble(index)
			.with_context(|| anyhow!("failed to assemble class {index}")))
		.collect::<Result<Vec<_>>>()?;

	let SegmentBands { header, pool, files, bytes_consumed, .. } = bands;
	debug!("decoded segment with {} classes", classes.len());
	Ok(DecodedSegment { header, pool, classes, files, bytes_consumed })
}

/// Decodes all segments of an archive, one after the other until the input ends.
pub fn decode_archive(data: &[u8]) -> Result<Vec<DecodedSegment>> {
	let mut rest = data;
	let mut segments = Vec::new();
	while !rest.is_empty() {
		let segment = decode_segment(rest)
			.with_context(|| anyhow!("failed to decode segment {} at byte {}", segments.len(), data.len() - rest.len()))?;
		rest = rest.get(segment.bytes_consumed..)
			.with_context(|| anyhow!("segment {} took up more bytes than there are", segments.len()))?;
		segments.push(segment);
	}
	Ok(segments)
}
