use crate::{Bhsd, ByteCursor, CodingError, BYTE1};

/// Any coding a band can be stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coding {
	Bhsd(Bhsd),
	/// The first `k` values are stored in `a`, the rest in `b`.
	Run {
		k: usize,
		a: Box<Coding>,
		b: Box<Coding>,
	},
	/// A list of favoured values, followed by tokens selecting one of them, or `0` to read the next
	/// value from the unfavoured values.
	Population {
		favoured: Box<Coding>,
		token: TokenCoding,
		unfavoured: Box<Coding>,
	},
}

/// How the tokens of a population coding are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCoding {
	Explicit(Box<Coding>),
	/// The coding is the shortest one with the given `L` that can store all tokens.
	Derived { l: u16 },
}

impl From<Bhsd> for Coding {
	fn from(value: Bhsd) -> Self {
		Coding::Bhsd(value)
	}
}

impl Coding {
	/// Decodes `count` values.
	///
	/// Each delta coded part of the coding starts out with a previous value of zero.
	pub fn decode_values(&self, source: &mut ByteCursor, count: usize) -> Result<Vec<i64>, CodingError> {
		match self {
			Coding::Bhsd(coding) => coding.decode_values(source, count, 0),
			Coding::Run { k, a, b } => {
				let first = count.min(*k);
				let mut values = a.decode_values(source, first)?;
				values.extend(b.decode_values(source, count - first)?);
				Ok(values)
			},
			Coding::Population { favoured, token, unfavoured } => {
				decode_population(favoured, token, unfavoured, source, count)
			},
		}
	}
}

/// A coding where values can be read one by one, without knowing how many there are.
///
/// Population codings need to know their length up front, all others can be read like this.
enum Sequence {
	Bhsd {
		coding: Bhsd,
		last: i64,
	},
	Run {
		left: usize,
		a: Box<Sequence>,
		b: Box<Sequence>,
	},
}

impl Sequence {
	fn new(coding: &Coding) -> Result<Sequence, CodingError> {
		Ok(match coding {
			Coding::Bhsd(coding) => Sequence::Bhsd { coding: *coding, last: 0 },
			Coding::Run { k, a, b } => Sequence::Run {
				left: *k,
				a: Box::new(Sequence::new(a)?),
				b: Box::new(Sequence::new(b)?),
			},
			// 141 is the first population coding specifier
			Coding::Population { .. } => return Err(CodingError::InvalidSpecifier { specifier: 141 }),
		})
	}

	fn next(&mut self, source: &mut ByteCursor) -> Result<i64, CodingError> {
		match self {
			Sequence::Bhsd { coding, last } => {
				*last = coding.decode(source, *last)?;
				Ok(*last)
			},
			Sequence::Run { left: 0, b, .. } => b.next(source),
			Sequence::Run { left, a, .. } => {
				*left -= 1;
				a.next(source)
			},
		}
	}
}

/// The favoured values end with either a repetition of the previous one, or a repetition of the one
/// closest to zero, where positive values are preferred.
fn read_favoured(coding: &Coding, source: &mut ByteCursor) -> Result<Vec<i64>, CodingError> {
	let mut sequence = Sequence::new(coding)?;

	let mut favoured: Vec<i64> = Vec::new();
	let mut nearest: Option<i64> = None;
	loop {
		let value = sequence.next(source)?;

		if favoured.last() == Some(&value) || nearest == Some(value) {
			return Ok(favoured);
		}

		favoured.push(value);
		nearest = Some(match nearest {
			Some(nearest) if nearest.abs() < value.abs() => nearest,
			Some(nearest) if nearest.abs() == value.abs() => nearest.abs(),
			_ => value,
		});
	}
}

/// Finds the coding for tokens selecting one of `favoured` values.
fn derive_token_coding(favoured: usize, l: u16) -> Result<Bhsd, CodingError> {
	if favoured < 256 {
		return Ok(BYTE1);
	}
	(2..=5)
		.map(|b| Bhsd::new(b, 256 - l, 0, false))
		.find(|coding| coding.encodes(favoured as i64))
		.ok_or(CodingError::InvalidToken { token: favoured as i64, favoured })
}

fn decode_population(
	favoured: &Coding,
	token: &TokenCoding,
	unfavoured: &Coding,
	source: &mut ByteCursor,
	count: usize,
) -> Result<Vec<i64>, CodingError> {
	let favoured_values = read_favoured(favoured, source)?;

	let tokens = match token {
		TokenCoding::Explicit(coding) => coding.decode_values(source, count)?,
		TokenCoding::Derived { l } => derive_token_coding(favoured_values.len(), *l)?
			.decode_values(source, count, 0)?,
	};

	let unfavoured_count = tokens.iter().filter(|&&token| token == 0).count();
	let mut unfavoured_values = unfavoured.decode_values(source, unfavoured_count)?.into_iter();

	tokens.into_iter()
		.map(|token| {
			if token == 0 {
				// there are exactly as many unfavoured values as zero tokens
				unfavoured_values.next().ok_or(CodingError::InvalidToken { token, favoured: favoured_values.len() })
			} else {
				usize::try_from(token - 1).ok()
					.and_then(|index| favoured_values.get(index))
					.copied()
					.ok_or(CodingError::InvalidToken { token, favoured: favoured_values.len() })
			}
		})
		.collect()
}
