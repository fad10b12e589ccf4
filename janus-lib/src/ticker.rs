// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! A round-robin selector over a fixed set of slots, where each slot
//! has a quota of ticks. Slots with a zero quota are never advertised.

#[derive(Clone, Debug)]
pub struct Ticker {
    ticks: Vec<u32>,
    index: usize,
    counter: u32,
}

impl Ticker {
    /// At least one quota must be positive.
    pub fn new(ticks: Vec<u32>) -> Self {
        assert!(ticks.iter().any(|&t| t > 0), "Ticker requires at least one non-zero quota");
        let mut index = 0;
        while ticks[index] == 0 {
            index += 1
        }
        Ticker { ticks, index, counter: 0 }
    }

    /// Return the active slot, consuming one tick of its quota.
    pub fn get_current(&mut self) -> usize {
        let current = self.index;
        self.counter += 1;
        if self.counter == self.ticks[self.index] {
            self.move_to_next()
        }
        current
    }

    /// Force advancement to the next slot with a positive quota,
    /// resetting the tick counter.
    pub fn move_to_next(&mut self) {
        assert!(self.ticks[self.index] != 0);

        if self.counter != 0 {
            self.index = (self.index + 1) % self.ticks.len();
            self.counter = 0;
        }

        while self.ticks[self.index] == 0 {
            self.index = (self.index + 1) % self.ticks.len()
        }
    }

    pub fn ticks(&self) -> &[u32] {
        &self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let mut ticker = Ticker::new(vec![0, 30, 30, 30]);
        for _ in 0..30 {
            assert_eq!(ticker.get_current(), 1)
        }
        for _ in 0..30 {
            assert_eq!(ticker.get_current(), 2)
        }
        for _ in 0..30 {
            assert_eq!(ticker.get_current(), 3)
        }
        // The zero-quota slot is skipped when the cycle wraps
        assert_eq!(ticker.get_current(), 1)
    }

    #[test]
    fn test_single_slot() {
        let mut ticker = Ticker::new(vec![0, 0, 5]);
        for _ in 0..17 {
            assert_eq!(ticker.get_current(), 2)
        }
    }

    #[test]
    fn test_move_to_next_resets() {
        let mut ticker = Ticker::new(vec![2, 0, 2]);
        assert_eq!(ticker.get_current(), 0);
        ticker.move_to_next();
        assert_eq!(ticker.get_current(), 2);
        assert_eq!(ticker.get_current(), 2);
        assert_eq!(ticker.get_current(), 0)
    }

    #[test]
    #[should_panic]
    fn test_all_zero() {
        Ticker::new(vec![0, 0, 0]);
    }
}
