use crate::{canonical, Bhsd, ByteCursor, Coding, CodingError, TokenCoding};

/// The `L` values of derived population token codings, indexed by the `tdef` part of the specifier.
const TOKEN_L: [u16; 12] = [0, 4, 8, 16, 32, 64, 128, 192, 224, 240, 248, 252];

impl Coding {
	/// Reads the coding selected by `specifier`.
	///
	/// Some specifiers need more bytes, which are read from `headers`. This also includes the specifiers
	/// of the codings nested in run and population codings. The `default` coding is used for the
	/// specifier `0`, and for all nested codings that are marked to be the default.
	pub fn from_specifier(specifier: u8, default: &Coding, headers: &mut ByteCursor) -> Result<Coding, CodingError> {
		let invalid = CodingError::InvalidSpecifier { specifier: specifier as u32 };
		Ok(match specifier {
			0 => default.clone(),
			1..=115 => Coding::Bhsd(canonical(specifier as usize).ok_or(invalid)?),
			116 => {
				let code = headers.read_u8()?;
				let d = code & 1 != 0;
				let s = (code >> 1) & 3;
				let b = ((code >> 3) & 7) + 1;
				let h = headers.read_u8()? as u16 + 1;
				Coding::Bhsd(Bhsd::checked(b, h, s, d, specifier as u32)?)
			},
			117..=140 => {
				let offset = specifier - 117;
				let kx = offset & 3;
				let kb_given = (offset >> 2) & 1 != 0;
				let a_default = (offset >> 3) & 1 != 0;
				// both being the default can't be expressed
				let b_default = (offset >> 4) & 1 != 0;

				let kb = if kb_given { headers.read_u8()? } else { 3 };
				let k = (kb as usize + 1) << (4 * kx);

				let a = nested(a_default, default, headers)?;
				let b = nested(b_default, default, headers)?;
				Coding::Run { k, a: Box::new(a), b: Box::new(b) }
			},
			141..=188 => {
				let offset = specifier - 141;
				let f_default = offset & 1 != 0;
				let u_default = (offset >> 1) & 1 != 0;
				let l = TOKEN_L[(offset >> 2) as usize];

				let favoured = nested(f_default, default, headers)?;
				// with a derived token coding, the unfavoured coding directly follows the favoured one
				let token = if l != 0 {
					TokenCoding::Derived { l }
				} else {
					let specifier = headers.read_u8()?;
					TokenCoding::Explicit(Box::new(Coding::from_specifier(specifier, default, headers)?))
				};
				let unfavoured = nested(u_default, default, headers)?;

				Coding::Population { favoured: Box::new(favoured), token, unfavoured: Box::new(unfavoured) }
			},
			_ => return Err(invalid),
		})
	}
}

fn nested(is_default: bool, default: &Coding, headers: &mut ByteCursor) -> Result<Coding, CodingError> {
	if is_default {
		Ok(default.clone())
	} else {
		let specifier = headers.read_u8()?;
		Coding::from_specifier(specifier, default, headers)
	}
}
