#![forbid(unsafe_code)]

/// Fixed-width storage for sub-byte unsigned values.
///
/// Values are stored little-endian within each `u64` word:
/// - value `i` occupies bits `(i * width) % 64 ..` of word `(i * width) / 64`
/// - widths divide 64, so a value never straddles two words
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedBits {
    width: u8,
    len: usize,
    words: Vec<u64>,
}

impl PackedBits {
    pub fn new(width: u8) -> Self {
        debug_assert!(matches!(width, 1 | 2 | 4), "unsupported bit width {width}");
        Self {
            width,
            len: 0,
            words: Vec::new(),
        }
    }

    pub fn with_capacity(width: u8, values: usize) -> Self {
        let mut out = Self::new(width);
        out.words.reserve(Self::words_for(width, values));
        out
    }

    pub fn pack(width: u8, values: impl IntoIterator<Item = u8>) -> Self {
        let values = values.into_iter();
        let mut out = Self::with_capacity(width, values.size_hint().0);
        for v in values {
            out.push(v);
        }
        out
    }

    fn words_for(width: u8, values: usize) -> usize {
        (values * width as usize + 63) / 64
    }

    fn per_word(&self) -> usize {
        64 / self.width as usize
    }

    fn mask(&self) -> u64 {
        (1u64 << self.width) - 1
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `value`, keeping only its low `width` bits.
    pub fn push(&mut self, value: u8) {
        let slot = self.len % self.per_word();
        if slot == 0 {
            self.words.push(0);
        }
        let shift = slot * self.width as usize;
        let bits = u64::from(value) & self.mask();
        if let Some(word) = self.words.last_mut() {
            *word |= bits << shift;
        }
        self.len += 1;
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        let per_word = self.per_word();
        let word = self.words[index / per_word];
        let shift = (index % per_word) * self.width as usize;
        Some(((word >> shift) & self.mask()) as u8)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let per_word = self.per_word();
        let width = self.width as usize;
        let mask = self.mask();
        self.words
            .iter()
            .flat_map(move |&word| (0..per_word).map(move |slot| ((word >> (slot * width)) & mask) as u8))
            .take(self.len)
    }

    /// Number of stored values that are not zero.
    pub fn count_nonzero(&self) -> usize {
        if self.width == 1 {
            return self.words.iter().map(|w| w.count_ones() as usize).sum();
        }
        self.iter().filter(|&v| v != 0).count()
    }

    pub fn heap_size_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }
}
