// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity bit set over slot indices.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// All bits cleared.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && self.words[idx / 64] & (1 << (idx % 64)) != 0
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        if idx >= self.len {
            return;
        }
        let bit = 1 << (idx % 64);
        if value {
            self.words[idx / 64] |= bit;
        } else {
            self.words[idx / 64] &= !bit;
        }
    }

    /// Append one bit.
    pub fn push(&mut self, value: bool) {
        if self.len % 64 == 0 {
            self.words.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, value);
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(wi * 64 + bit)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_iter() {
        let mut bits = BitSet::new(130);
        bits.set(0, true);
        bits.set(64, true);
        bits.set(129, true);
        bits.set(500, true); // out of range is ignored
        assert!(bits.get(64));
        assert!(!bits.get(63));
        assert_eq!(bits.count_ones(), 3);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 64, 129]);
        bits.set(64, false);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn test_push_grows() {
        let mut bits = BitSet::default();
        for i in 0..70 {
            bits.push(i % 3 == 0);
        }
        assert_eq!(bits.len(), 70);
        assert_eq!(bits.count_ones(), 24);
        assert!(bits.get(69));
        assert!(bits.any());
    }
}
