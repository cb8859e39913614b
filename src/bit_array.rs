//! Occupancy bits stored as `u64` words.
//!
//! Bit `i` lives in word `i / 64` at position `i % 64`. Every search takes an
//! explicit length so bits past the logical end are never reported.

pub const WORD_BITS: usize = u64::BITS as usize;

/// Number of words needed to hold `bits` bits.
#[inline]
pub const fn bit_words(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

#[inline(always)]
const fn split(index: usize) -> (usize, u64) {
    (index / WORD_BITS, 1u64 << (index % WORD_BITS))
}

#[inline]
pub fn get(words: &[u64], index: usize) -> bool {
    let (word, mask) = split(index);
    words[word] & mask != 0
}

#[inline]
pub fn set(words: &mut [u64], index: usize, value: bool) {
    let (word, mask) = split(index);

    if value {
        words[word] |= mask;
    } else {
        words[word] &= !mask;
    }
}

pub fn set_all(words: &mut [u64], value: bool) {
    words.fill(if value { u64::MAX } else { 0 });
}

/// Number of set bits in `[0, len)`.
pub fn count_ones(words: &[u64], len: usize) -> usize {
    let full = len / WORD_BITS;
    let mut count: usize = words[..full].iter().map(|w| w.count_ones() as usize).sum();

    let rest = len % WORD_BITS;
    if rest != 0 {
        count += (words[full] & ((1u64 << rest) - 1)).count_ones() as usize;
    }

    count
}

#[inline]
fn find_forward(words: &[u64], start: usize, len: usize, invert: u64) -> Option<usize> {
    if start >= len {
        return None;
    }

    let mut word_idx = start / WORD_BITS;
    let mut word = (words[word_idx] ^ invert) & (u64::MAX << (start % WORD_BITS));

    loop {
        if word != 0 {
            let found = word_idx * WORD_BITS + word.trailing_zeros() as usize;
            return (found < len).then_some(found);
        }

        word_idx += 1;

        if word_idx * WORD_BITS >= len {
            return None;
        }

        word = words[word_idx] ^ invert;
    }
}

/// First set bit in `[start, len)`.
#[inline]
pub fn find_next(words: &[u64], start: usize, len: usize) -> Option<usize> {
    find_forward(words, start, len, 0)
}

/// First clear bit in `[start, len)`.
#[inline]
pub fn find_next_unset(words: &[u64], start: usize, len: usize) -> Option<usize> {
    find_forward(words, start, len, u64::MAX)
}

/// Last set bit in `[0, start]`.
pub fn find_prev(words: &[u64], start: usize) -> Option<usize> {
    let mut word_idx = start / WORD_BITS;
    let mut word = words[word_idx] & (u64::MAX >> (WORD_BITS - 1 - start % WORD_BITS));

    loop {
        if word != 0 {
            return Some(word_idx * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as usize));
        }

        if word_idx == 0 {
            return None;
        }

        word_idx -= 1;
        word = words[word_idx];
    }
}

/// Walks the set bits of `[0, len)` from both ends.
#[derive(Clone)]
pub struct BitCursor<'a> {
    words: &'a [u64],
    front: usize,
    // exclusive
    back: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(words: &'a [u64], len: usize) -> Self {
        debug_assert!(len <= words.len() * WORD_BITS, "BitCursor: len out of bounds");
        Self {
            words,
            front: 0,
            back: len,
        }
    }
}

impl Iterator for BitCursor<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let found = find_next(self.words, self.front, self.back)?;
        self.front = found + 1;
        Some(found)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.back.saturating_sub(self.front)))
    }
}

impl DoubleEndedIterator for BitCursor<'_> {
    fn next_back(&mut self) -> Option<usize> {
        if self.back <= self.front {
            return None;
        }

        match find_prev(self.words, self.back - 1) {
            Some(found) if found >= self.front => {
                self.back = found;
                Some(found)
            }
            _ => {
                self.back = self.front;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for BitCursor<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_with(bits: &[usize], len: usize) -> Vec<u64> {
        let mut words = vec![0; bit_words(len)];
        for &bit in bits {
            set(&mut words, bit, true);
        }
        words
    }

    #[test]
    fn forward_search_crosses_words() {
        let words = words_with(&[3, 64, 130], 200);

        assert_eq!(find_next(&words, 0, 200), Some(3));
        assert_eq!(find_next(&words, 4, 200), Some(64));
        assert_eq!(find_next(&words, 65, 200), Some(130));
        assert_eq!(find_next(&words, 131, 200), None);
        assert_eq!(find_next(&words, 65, 130), None);
    }

    #[test]
    fn backward_search_crosses_words() {
        let words = words_with(&[0, 63, 127], 128);

        assert_eq!(find_prev(&words, 127), Some(127));
        assert_eq!(find_prev(&words, 126), Some(63));
        assert_eq!(find_prev(&words, 62), Some(0));

        let words = words_with(&[5], 128);
        assert_eq!(find_prev(&words, 4), None);
    }

    #[test]
    fn unset_search_skips_full_words() {
        let mut words = vec![u64::MAX; 2];
        set(&mut words, 100, false);

        assert_eq!(find_next_unset(&words, 0, 128), Some(100));
        assert_eq!(find_next_unset(&words, 101, 128), None);
    }

    #[test]
    fn popcount_respects_len() {
        let words = words_with(&[1, 2, 70, 71], 128);

        assert_eq!(count_ones(&words, 128), 4);
        assert_eq!(count_ones(&words, 71), 3);
        assert_eq!(count_ones(&words, 64), 2);
    }

    #[test]
    fn cursor_walks_both_ends() {
        let words = words_with(&[1, 5, 64, 99], 100);
        let mut cursor = BitCursor::new(&words, 100);

        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next_back(), Some(99));
        assert_eq!(cursor.next_back(), Some(64));
        assert_eq!(cursor.next(), Some(5));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.next_back(), None);

        let all: Vec<_> = BitCursor::new(&words, 100).rev().collect();
        assert_eq!(all, vec![99, 64, 5, 1]);
    }
}
