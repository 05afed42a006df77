use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use pack_coding::{Bhsd, CHAR3, DELTA5, UDELTA5, UNSIGNED5};
use crate::cp::{ConstantPool, CpEntry, CpKind, CpRef};
use crate::DecodeError;
use crate::header::CpCounts;
use crate::jstring::from_utf16_units;
use crate::stream::{sum, BandReader};

fn to_unit(band: &str, value: i64) -> Result<u16> {
	u16::try_from(value)
		.map_err(|_| anyhow!(DecodeError::format(format!("{band} value {value} isn't a UTF-16 code unit"))))
}

/// Reads the strings of the `Utf8` entries as UTF-16 code units.
///
/// Each string but the first two shares a prefix with the string before it. The rest of a string is
/// either stored in the common characters band, or, if its length is given as zero, in a band of its own.
fn read_utf8_units(reader: &mut BandReader, count: usize) -> Result<Vec<Vec<u16>>> {
	let prefixes = reader.counts("cp_Utf8_prefix", DELTA5, count.saturating_sub(2))?;
	let suffixes = reader.counts("cp_Utf8_suffix", UNSIGNED5, count.saturating_sub(1))?;

	let chars_count = sum("cp_Utf8_suffix", &suffixes)?;
	let chars = reader.band("cp_Utf8_chars", CHAR3, chars_count)?;

	let big_count = suffixes.iter().filter(|&&suffix| suffix == 0).count();
	let big_suffixes = reader.counts("cp_Utf8_big_suffix", DELTA5, big_count)?;
	let mut big_chars = Vec::with_capacity(big_count);
	for (i, &len) in big_suffixes.iter().enumerate() {
		big_chars.push(reader.band(&format!("cp_Utf8_big_chars[{i}]"), DELTA5, len)?);
	}

	let mut strings: Vec<Vec<u16>> = Vec::with_capacity(count);
	if count > 0 {
		strings.push(Vec::new());
	}
	let mut chars = chars.into_iter();
	let mut big_chars = big_chars.into_iter();
	for (i, &suffix) in suffixes.iter().enumerate() {
		let prefix = if i == 0 { 0 } else { prefixes[i - 1] };
		let previous = &strings[i];
		if prefix > previous.len() {
			bail!(DecodeError::band_length("cp_Utf8_prefix", format!(
				"prefix {prefix} of string {} is longer than the string before it", i + 1,
			)));
		}

		let mut string = previous[..prefix].to_vec();
		if suffix == 0 {
			for value in big_chars.next().into_iter().flatten() {
				string.push(to_unit("cp_Utf8_big_chars", value)?);
			}
		} else {
			for value in chars.by_ref().take(suffix) {
				string.push(to_unit("cp_Utf8_chars", value)?);
			}
		}
		strings.push(string);
	}
	Ok(strings)
}

fn read_refs(reader: &mut BandReader, pool: &ConstantPool, name: &str, coding: Bhsd, count: usize, kind: CpKind) -> Result<Vec<CpRef>> {
	reader.band(name, coding, count)?
		.into_iter()
		.map(|index| pool.resolve(index, kind).with_context(|| anyhow!("in band {name}")))
		.collect()
}

fn push_all(pool: &mut ConstantPool, entries: impl IntoIterator<Item=CpEntry>) {
	for entry in entries {
		pool.push(entry);
	}
}

/// Makes the pool entries of the following kinds visible for resolving.
fn publish(pool: &mut ConstantPool, kind: CpKind) {
	pool.band_counts[kind.slot()] = pool.len(kind);
}

/// Reads the constant pool bands.
pub(crate) fn read_constant_pool(reader: &mut BandReader, counts: &CpCounts) -> Result<ConstantPool> {
	let mut pool = ConstantPool::default();

	let units = read_utf8_units(reader, counts.utf8)?;
	for (i, string) in units.iter().enumerate() {
		let string = from_utf16_units(string)
			.with_context(|| anyhow!("in utf8 constant {i}"))?;
		pool.push(CpEntry::Utf8(string));
	}
	publish(&mut pool, CpKind::Utf8);

	let ints = reader.band("cp_Int", UDELTA5, counts.int)?;
	push_all(&mut pool, ints.into_iter().map(|bits| CpEntry::Int(bits as i32)));

	let floats = reader.band("cp_Float", UDELTA5, counts.float)?;
	push_all(&mut pool, floats.into_iter().map(|bits| CpEntry::Float(f32::from_bits(bits as u32))));

	let long_hi = reader.band("cp_Long_hi", UDELTA5, counts.long)?;
	let long_lo = reader.band("cp_Long_lo", DELTA5, counts.long)?;
	push_all(&mut pool, long_hi.into_iter().zip(long_lo)
		.map(|(hi, lo)| CpEntry::Long(combine(hi, lo) as i64)));

	let double_hi = reader.band("cp_Double_hi", UDELTA5, counts.double)?;
	let double_lo = reader.band("cp_Double_lo", DELTA5, counts.double)?;
	push_all(&mut pool, double_hi.into_iter().zip(double_lo)
		.map(|(hi, lo)| CpEntry::Double(f64::from_bits(combine(hi, lo)))));

	let strings = read_refs(reader, &pool, "cp_String", UDELTA5, counts.string, CpKind::Utf8)?;
	push_all(&mut pool, strings.into_iter().map(CpEntry::String));

	let classes = read_refs(reader, &pool, "cp_Class", UDELTA5, counts.class, CpKind::Utf8)?;
	push_all(&mut pool, classes.into_iter().map(CpEntry::Class));
	for kind in [CpKind::Int, CpKind::Float, CpKind::Long, CpKind::Double, CpKind::String, CpKind::Class] {
		publish(&mut pool, kind);
	}

	let forms = read_refs(reader, &pool, "cp_Signature_form", DELTA5, counts.signature, CpKind::Utf8)?;
	let class_counts: Vec<usize> = forms.iter()
		.map(|&form| units[form.index].iter().filter(|&&unit| unit == b'L' as u16).count())
		.collect();
	let class_count = sum("cp_Signature_form", &class_counts)?;
	let signature_classes = read_refs(reader, &pool, "cp_Signature_classes", UDELTA5, class_count, CpKind::Class)?;
	let mut signature_classes = signature_classes.into_iter();
	for (form, count) in forms.into_iter().zip(class_counts) {
		let classes: Vec<CpRef> = signature_classes.by_ref().take(count).collect();

		let mut text = Vec::new();
		let mut names = classes.iter();
		for &unit in &units[form.index] {
			text.push(unit);
			if unit == b'L' as u16 {
				if let Some(class) = names.next() {
					let CpEntry::Class(name) = pool.get(*class)? else {
						bail!("class {class} isn't a class entry");
					};
					text.extend_from_slice(&units[name.index]);
				}
			}
		}
		let text = from_utf16_units(&text)
			.with_context(|| anyhow!("in signature with form {form}"))?;
		pool.push(CpEntry::Signature { form, classes, text });
	}
	publish(&mut pool, CpKind::Signature);

	let names = read_refs(reader, &pool, "cp_Descr_name", DELTA5, counts.descr, CpKind::Utf8)?;
	let types = read_refs(reader, &pool, "cp_Descr_type", UDELTA5, counts.descr, CpKind::Signature)?;
	push_all(&mut pool, names.into_iter().zip(types)
		.map(|(name, descriptor)| CpEntry::Descr { name, descriptor }));
	publish(&mut pool, CpKind::Descr);

	for (kind, prefix, count) in [
		(CpKind::Field, "cp_Field", counts.field),
		(CpKind::Method, "cp_Method", counts.method),
		(CpKind::IMethod, "cp_Imethod", counts.imethod),
	] {
		let classes = read_refs(reader, &pool, &format!("{prefix}_class"), DELTA5, count, CpKind::Class)?;
		let descrs = read_refs(reader, &pool, &format!("{prefix}_desc"), UDELTA5, count, CpKind::Descr)?;
		push_all(&mut pool, classes.into_iter().zip(descrs).map(|(class, descr)| match kind {
			CpKind::Field => CpEntry::Field { class, descr },
			CpKind::Method => CpEntry::Method { class, descr },
			_ => CpEntry::IMethod { class, descr },
		}));
	}

	pool.finish_bands()?;
	debug!("read constant pool of {} utf8, {} class, {} signature and {} member entries",
		counts.utf8, counts.class, counts.signature, counts.field + counts.method + counts.imethod);
	Ok(pool)
}

fn combine(hi: i64, lo: i64) -> u64 {
	(hi as u32 as u64) << 32 | lo as u32 as u64
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pack_coding::{Bhsd, CHAR3, DELTA5, UDELTA5, UNSIGNED5};
	use pretty_assertions::assert_eq;
	use crate::cp::{read_constant_pool, CpEntry, CpKind};
	use crate::DecodeError;
	use crate::header::CpCounts;
	use crate::stream::BandReader;

	fn bands(bands: &[(Bhsd, &[i64])]) -> Vec<u8> {
		let mut out = Vec::new();
		for (coding, values) in bands {
			coding.encode_values(values, &mut out).unwrap();
		}
		out
	}

	fn units(s: &str) -> Vec<i64> {
		s.encode_utf16().map(|unit| unit as i64).collect()
	}

	#[test]
	fn utf8_prefixes_and_suffixes() -> Result<()> {
		// "", "java/lang/Object", "java/lang/String", "java/util/List", "x"
		let mut chars = units("java/lang/Object");
		chars.extend(units("String"));
		chars.extend(units("util/List"));
		let data = bands(&[
			(DELTA5, &[10, 5, 0]),
			(UNSIGNED5, &[16, 6, 9, 0]),
			(CHAR3, &chars[..]),
			(DELTA5, &[1]),
			(DELTA5, &[0x78]),
		]);
		let mut reader = BandReader::new(&data);
		let pool = read_constant_pool(&mut reader, &CpCounts { utf8: 5, ..CpCounts::default() })?;
		assert_eq!(reader.remaining(), 0);

		let strings: Vec<_> = (0..5)
			.map(|i| pool.utf8(pool.resolve(i, CpKind::Utf8)?).map(ToOwned::to_owned))
			.collect::<Result<_>>()?;
		assert_eq!(strings, ["", "java/lang/Object", "java/lang/String", "java/util/List", "x"]
			.map(|s| JavaStr::from_str(s).to_owned()));
		Ok(())
	}

	#[test]
	fn prefix_longer_than_previous() {
		let data = bands(&[
			(DELTA5, &[2]),
			(UNSIGNED5, &[1, 1]),
			(CHAR3, &[0x61, 0x62]),
		]);
		let mut reader = BandReader::new(&data);
		let error = read_constant_pool(&mut reader, &CpCounts { utf8: 3, ..CpCounts::default() }).unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::BandLength { .. })));
	}

	#[test]
	fn numbers() -> Result<()> {
		let data = bands(&[
			(UDELTA5, &[-5]),
			(UDELTA5, &[1.5f32.to_bits() as i32 as i64]),
			(UDELTA5, &[1]),
			(DELTA5, &[-1]),
			(UDELTA5, &[(2.5f64.to_bits() >> 32) as i32 as i64]),
			(DELTA5, &[2.5f64.to_bits() as i32 as i64]),
		]);
		let mut reader = BandReader::new(&data);
		let counts = CpCounts { int: 1, float: 1, long: 1, double: 1, ..CpCounts::default() };
		let pool = read_constant_pool(&mut reader, &counts)?;
		assert_eq!(pool.get(pool.resolve(0, CpKind::Int)?)?, &CpEntry::Int(-5));
		assert_eq!(pool.get(pool.resolve(0, CpKind::Float)?)?, &CpEntry::Float(1.5));
		assert_eq!(pool.get(pool.resolve(0, CpKind::Long)?)?, &CpEntry::Long(0x1_ffff_ffff));
		assert_eq!(pool.get(pool.resolve(0, CpKind::Double)?)?, &CpEntry::Double(2.5));
		Ok(())
	}

	#[test]
	fn signatures_and_members() -> Result<()> {
		// utf8: "", "a/B", "(L;)L;", "m"
		let mut chars = units("a/B");
		chars.extend(units("(L;)L;"));
		chars.extend(units("m"));
		let data = bands(&[
			(DELTA5, &[0, 0]),
			(UNSIGNED5, &[3, 6, 1]),
			(CHAR3, &chars[..]),
			(DELTA5, &[]),
			// cp_Class
			(UDELTA5, &[1]),
			// cp_Signature_form, cp_Signature_classes
			(DELTA5, &[2]),
			(UDELTA5, &[0, 0]),
			// cp_Descr_name, cp_Descr_type
			(DELTA5, &[3]),
			(UDELTA5, &[0]),
			// cp_Method_class, cp_Method_desc
			(DELTA5, &[0]),
			(UDELTA5, &[0]),
		]);
		let counts = CpCounts { utf8: 4, class: 1, signature: 1, descr: 1, method: 1, ..CpCounts::default() };
		let mut reader = BandReader::new(&data);
		let pool = read_constant_pool(&mut reader, &counts)?;
		assert_eq!(reader.remaining(), 0);

		let signature = pool.resolve(0, CpKind::Signature)?;
		assert_eq!(pool.text(signature)?, JavaStr::from_str("(La/B;)La/B;"));
		let method = pool.resolve(0, CpKind::Method)?;
		assert_eq!(pool.member_name(method)?, JavaStr::from_str("m"));
		assert_eq!(pool.methods_of(pool.resolve(0, CpKind::Class)?), &[method]);
		Ok(())
	}

	#[test]
	fn index_one_past_the_end() {
		let data = bands(&[
			(DELTA5, &[]),
			(UNSIGNED5, &[1]),
			(CHAR3, &[0x61]),
			(DELTA5, &[]),
			(UDELTA5, &[2]),
		]);
		let counts = CpCounts { utf8: 2, class: 1, ..CpCounts::default() };
		let mut reader = BandReader::new(&data);
		let error = read_constant_pool(&mut reader, &counts).unwrap_err();
		assert!(matches!(DecodeError::find(&error), Some(DecodeError::UnresolvedReference { index: 2, .. })));
	}
}
