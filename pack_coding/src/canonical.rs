use crate::Bhsd;

const fn c(b: u8, h: u16, s: u8, d: u8) -> Bhsd {
	Bhsd::new(b, h, s, d != 0)
}

/// The canonical codings, the entry at index `i` is selected by the specifier `i + 1`.
#[rustfmt::skip]
const CANONICAL: [Bhsd; 115] = [
	c(1, 256, 0, 0), c(1, 256, 1, 0), c(1, 256, 0, 1), c(1, 256, 1, 1),
	c(2, 256, 0, 0), c(2, 256, 1, 0), c(2, 256, 0, 1), c(2, 256, 1, 1),
	c(3, 256, 0, 0), c(3, 256, 1, 0), c(3, 256, 0, 1), c(3, 256, 1, 1),
	c(4, 256, 0, 0), c(4, 256, 1, 0), c(4, 256, 0, 1), c(4, 256, 1, 1),
	// 17
	c(5, 4, 0, 0), c(5, 4, 1, 0), c(5, 4, 2, 0),
	c(5, 16, 0, 0), c(5, 16, 1, 0), c(5, 16, 2, 0),
	c(5, 32, 0, 0), c(5, 32, 1, 0), c(5, 32, 2, 0),
	c(5, 64, 0, 0), c(5, 64, 1, 0), c(5, 64, 2, 0),
	c(5, 128, 0, 0), c(5, 128, 1, 0), c(5, 128, 2, 0),
	// 32
	c(5, 4, 0, 1), c(5, 4, 1, 1), c(5, 4, 2, 1),
	c(5, 16, 0, 1), c(5, 16, 1, 1), c(5, 16, 2, 1),
	c(5, 32, 0, 1), c(5, 32, 1, 1), c(5, 32, 2, 1),
	c(5, 64, 0, 1), c(5, 64, 1, 1), c(5, 64, 2, 1),
	c(5, 128, 0, 1), c(5, 128, 1, 1), c(5, 128, 2, 1),
	// 47
	c(2, 192, 0, 0), c(2, 224, 0, 0), c(2, 240, 0, 0), c(2, 248, 0, 0), c(2, 252, 0, 0),
	c(2, 8, 0, 1), c(2, 8, 1, 1), c(2, 16, 0, 1), c(2, 16, 1, 1), c(2, 32, 0, 1), c(2, 32, 1, 1),
	c(2, 64, 0, 1), c(2, 64, 1, 1), c(2, 128, 0, 1), c(2, 128, 1, 1), c(2, 192, 0, 1), c(2, 192, 1, 1),
	c(2, 224, 0, 1), c(2, 224, 1, 1), c(2, 240, 0, 1), c(2, 240, 1, 1), c(2, 248, 0, 1), c(2, 248, 1, 1),
	// 70
	c(3, 192, 0, 0), c(3, 224, 0, 0), c(3, 240, 0, 0), c(3, 248, 0, 0), c(3, 252, 0, 0),
	c(3, 8, 0, 1), c(3, 8, 1, 1), c(3, 16, 0, 1), c(3, 16, 1, 1), c(3, 32, 0, 1), c(3, 32, 1, 1),
	c(3, 64, 0, 1), c(3, 64, 1, 1), c(3, 128, 0, 1), c(3, 128, 1, 1), c(3, 192, 0, 1), c(3, 192, 1, 1),
	c(3, 224, 0, 1), c(3, 224, 1, 1), c(3, 240, 0, 1), c(3, 240, 1, 1), c(3, 248, 0, 1), c(3, 248, 1, 1),
	// 93
	c(4, 192, 0, 0), c(4, 224, 0, 0), c(4, 240, 0, 0), c(4, 248, 0, 0), c(4, 252, 0, 0),
	c(4, 8, 0, 1), c(4, 8, 1, 1), c(4, 16, 0, 1), c(4, 16, 1, 1), c(4, 32, 0, 1), c(4, 32, 1, 1),
	c(4, 64, 0, 1), c(4, 64, 1, 1), c(4, 128, 0, 1), c(4, 128, 1, 1), c(4, 192, 0, 1), c(4, 192, 1, 1),
	c(4, 224, 0, 1), c(4, 224, 1, 1), c(4, 240, 0, 1), c(4, 240, 1, 1), c(4, 248, 0, 1), c(4, 248, 1, 1),
];

/// Gets the canonical coding selected by a specifier in `1..=115`.
pub fn canonical(specifier: usize) -> Option<Bhsd> {
	specifier.checked_sub(1).and_then(|index| CANONICAL.get(index)).copied()
}

/// Finds the specifier of a coding, if it's a canonical one.
pub fn specifier_of(coding: Bhsd) -> Option<usize> {
	CANONICAL.iter().position(|&c| c == coding).map(|index| index + 1)
}
