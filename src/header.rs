//! The segment header: magic, version, option bits and the counts sizing all other bands.

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use pack_coding::UNSIGNED5;
use crate::DecodeError;
use crate::stream::BandReader;

const MAGIC: [u8; 4] = [0xca, 0xfe, 0xd0, 0x0d];

/// The archive versions this decoder can read.
pub const SUPPORTED_VERSIONS: [u16; 2] = [150, 160];

/// The option bits of a segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentOptions(pub u32);

impl SegmentOptions {
	pub const HAVE_SPECIAL_FORMATS: u32 = 1 << 0;
	pub const HAVE_CP_NUMBERS: u32 = 1 << 1;
	pub const HAVE_ALL_CODE_FLAGS: u32 = 1 << 2;
	pub const HAVE_CP_EXTRAS: u32 = 1 << 3;
	pub const HAVE_FILE_HEADERS: u32 = 1 << 4;
	pub const DEFLATE_HINT: u32 = 1 << 5;
	pub const HAVE_FILE_MODTIME: u32 = 1 << 6;
	pub const HAVE_FILE_OPTIONS: u32 = 1 << 7;
	pub const HAVE_FILE_SIZE_HI: u32 = 1 << 8;
	pub const HAVE_CLASS_FLAGS_HI: u32 = 1 << 9;
	pub const HAVE_FIELD_FLAGS_HI: u32 = 1 << 10;
	pub const HAVE_METHOD_FLAGS_HI: u32 = 1 << 11;
	pub const HAVE_CODE_FLAGS_HI: u32 = 1 << 12;

	const KNOWN: u32 = (1 << 13) - 1;

	fn is(&self, bit: u32) -> bool {
		self.0 & bit != 0
	}

	pub fn have_special_formats(&self) -> bool { self.is(Self::HAVE_SPECIAL_FORMATS) }
	pub fn have_cp_numbers(&self) -> bool { self.is(Self::HAVE_CP_NUMBERS) }
	pub fn have_all_code_flags(&self) -> bool { self.is(Self::HAVE_ALL_CODE_FLAGS) }
	pub fn have_cp_extras(&self) -> bool { self.is(Self::HAVE_CP_EXTRAS) }
	pub fn have_file_headers(&self) -> bool { self.is(Self::HAVE_FILE_HEADERS) }
	pub fn deflate_hint(&self) -> bool { self.is(Self::DEFLATE_HINT) }
	pub fn have_file_modtime(&self) -> bool { self.is(Self::HAVE_FILE_MODTIME) }
	pub fn have_file_options(&self) -> bool { self.is(Self::HAVE_FILE_OPTIONS) }
	pub fn have_file_size_hi(&self) -> bool { self.is(Self::HAVE_FILE_SIZE_HI) }
	pub fn have_class_flags_hi(&self) -> bool { self.is(Self::HAVE_CLASS_FLAGS_HI) }
	pub fn have_field_flags_hi(&self) -> bool { self.is(Self::HAVE_FIELD_FLAGS_HI) }
	pub fn have_method_flags_hi(&self) -> bool { self.is(Self::HAVE_METHOD_FLAGS_HI) }
	pub fn have_code_flags_hi(&self) -> bool { self.is(Self::HAVE_CODE_FLAGS_HI) }
}

/// The number of constant pool entries of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpCounts {
	pub utf8: usize,
	pub int: usize,
	pub float: usize,
	pub long: usize,
	pub double: usize,
	pub string: usize,
	pub class: usize,
	pub signature: usize,
	pub descr: usize,
	pub field: usize,
	pub method: usize,
	pub imethod: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
	pub minor_version: u16,
	pub major_version: u16,
	pub options: SegmentOptions,

	/// The number of bytes following the archive size, zero if unknown.
	pub archive_size: u64,
	pub archive_next_count: usize,
	pub archive_modtime: i64,
	pub file_count: usize,

	pub band_headers_size: usize,
	pub attr_definition_count: usize,

	pub cp: CpCounts,

	pub ic_count: usize,
	pub default_class_minor_version: u16,
	pub default_class_major_version: u16,
	pub class_count: usize,
}

fn version(name: &str, value: i64) -> Result<u16> {
	u16::try_from(value)
		.map_err(|_| anyhow!(DecodeError::format(format!("{name} {value} is out of range"))))
}

impl SegmentHeader {
	/// Reads the header, and restricts the reader to the segment if the archive size is given.
	///
	/// This doesn't read the band headers, only their size.
	pub(crate) fn read(reader: &mut BandReader) -> Result<SegmentHeader> {
		let magic = reader.bytes("archive_magic", MAGIC.len())?;
		if magic != MAGIC {
			bail!(DecodeError::format(format!("invalid magic {magic:02x?}, expected {MAGIC:02x?}")));
		}

		let minor_version = version("archive_minver", reader.scalar("archive_minver", UNSIGNED5)?)?;
		let major_version = version("archive_majver", reader.scalar("archive_majver", UNSIGNED5)?)?;
		if !SUPPORTED_VERSIONS.contains(&major_version) {
			bail!(DecodeError::format(format!("unsupported archive version {major_version}.{minor_version}")));
		}

		let options = reader.scalar("archive_options", UNSIGNED5)?;
		let options = u32::try_from(options)
			.map(SegmentOptions)
			.map_err(|_| anyhow!(DecodeError::format(format!("invalid archive options {options}"))))?;
		if options.have_cp_extras() {
			bail!(DecodeError::format("constant pool extensions of newer archive versions aren't supported"));
		}
		if options.0 & !SegmentOptions::KNOWN != 0 {
			warn!("ignoring unknown archive option bits {:#x}", options.0 & !SegmentOptions::KNOWN);
		}

		let mut archive_size = 0;
		let mut archive_next_count = 0;
		let mut archive_modtime = 0;
		let mut file_count = 0;
		if options.have_file_headers() {
			let hi = reader.scalar("archive_size_hi", UNSIGNED5)? as u64;
			let lo = reader.scalar("archive_size_lo", UNSIGNED5)? as u64;
			archive_size = hi << 32 | lo;
			if archive_size != 0 {
				reader.limit(archive_size)
					.with_context(|| anyhow!("archive size {archive_size} is larger than the input"))?;
			}

			archive_next_count = reader.scalar_count("archive_next_count", UNSIGNED5)?;
			archive_modtime = reader.scalar("archive_modtime", UNSIGNED5)?;
			file_count = reader.scalar_count("file_count", UNSIGNED5)?;
		}

		let mut band_headers_size = 0;
		let mut attr_definition_count = 0;
		if options.have_special_formats() {
			band_headers_size = reader.scalar_count("band_headers_size", UNSIGNED5)?;
			attr_definition_count = reader.scalar_count("attr_definition_count", UNSIGNED5)?;
		}

		let mut cp = CpCounts {
			utf8: reader.scalar_count("cp_Utf8_count", UNSIGNED5)?,
			..CpCounts::default()
		};
		if options.have_cp_numbers() {
			cp.int = reader.scalar_count("cp_Int_count", UNSIGNED5)?;
			cp.float = reader.scalar_count("cp_Float_count", UNSIGNED5)?;
			cp.long = reader.scalar_count("cp_Long_count", UNSIGNED5)?;
			cp.double = reader.scalar_count("cp_Double_count", UNSIGNED5)?;
		}
		cp.string = reader.scalar_count("cp_String_count", UNSIGNED5)?;
		cp.class = reader.scalar_count("cp_Class_count", UNSIGNED5)?;
		cp.signature = reader.scalar_count("cp_Signature_count", UNSIGNED5)?;
		cp.descr = reader.scalar_count("cp_Descr_count", UNSIGNED5)?;
		cp.field = reader.scalar_count("cp_Field_count", UNSIGNED5)?;
		cp.method = reader.scalar_count("cp_Method_count", UNSIGNED5)?;
		cp.imethod = reader.scalar_count("cp_Imethod_count", UNSIGNED5)?;

		let ic_count = reader.scalar_count("ic_count", UNSIGNED5)?;
		let default_class_minor_version = version("default_class_minver", reader.scalar("default_class_minver", UNSIGNED5)?)?;
		let default_class_major_version = version("default_class_majver", reader.scalar("default_class_majver", UNSIGNED5)?)?;
		let class_count = reader.scalar_count("class_count", UNSIGNED5)?;

		let header = SegmentHeader {
			minor_version,
			major_version,
			options,
			archive_size,
			archive_next_count,
			archive_modtime,
			file_count,
			band_headers_size,
			attr_definition_count,
			cp,
			ic_count,
			default_class_minor_version,
			default_class_major_version,
			class_count,
		};
		debug!(
			"segment version {major_version}.{minor_version}, options {:#x}, {class_count} classes, {file_count} files, {} band header bytes",
			options.0, band_headers_size,
		);
		Ok(header)
	}

	/// The number of entries in the constant pool bands, over all kinds.
	pub fn cp_total(&self) -> usize {
		let cp = &self.cp;
		cp.utf8 + cp.int + cp.float + cp.long + cp.double + cp.string + cp.class + cp.signature + cp.descr
			+ cp.field + cp.method + cp.imethod
	}
}
