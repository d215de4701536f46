// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::Rng;

use crate::sampler::WeightedBst;
use crate::PortId;

/// Saturation bound for a single virtual output queue. Arrivals beyond it
/// are dropped and counted, never queued.
pub const MAX_VOQ_LEN: u32 = 1024;

/// Per-input virtual output queues: one length counter per output port,
/// a cached sum, and the sampling tree kept in lockstep. The remaining
/// per-frame counters of the batch matcher are the same quantity, so this
/// table serves both engines.
#[derive(Clone, Debug)]
pub struct VoqState {
    lengths: Vec<u32>,
    sum: u32,
    bst: WeightedBst,
    dropped: u64,
    underflows: u64,
}

impl VoqState {
    pub fn new(ports: usize) -> Self {
        assert!(ports >= 1);
        Self {
            lengths: vec![0; ports],
            sum: 0,
            bst: WeightedBst::new(ports),
            dropped: 0,
            underflows: 0,
        }
    }

    pub fn ports(&self) -> usize {
        self.lengths.len()
    }

    pub fn len(&self, output: PortId) -> u32 {
        self.lengths[output]
    }

    pub fn total(&self) -> u32 {
        self.sum
    }

    pub fn max_len(&self) -> u32 {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn underflows(&self) -> u64 {
        self.underflows
    }

    /// Queue one packet toward `output`. Returns false when the queue is
    /// saturated and the arrival was dropped.
    pub fn add(&mut self, output: PortId) -> bool {
        if self.lengths[output] >= MAX_VOQ_LEN {
            self.dropped += 1;
            return false;
        }
        self.lengths[output] += 1;
        self.sum += 1;
        self.bst.update(output, 1);
        true
    }

    /// Remove one packet toward `output` (virtual departure). Removing
    /// from an empty queue is a scheduling bug: fatal in debug builds,
    /// clamped and counted in release.
    pub fn remove(&mut self, output: PortId) {
        if self.lengths[output] == 0 {
            debug_assert!(false, "removing packet from empty VOQ {}", output);
            log::error!("VOQ underflow on output {}; clamping", output);
            self.underflows += 1;
            return;
        }
        self.lengths[output] -= 1;
        self.sum -= 1;
        self.bst.update(output, -1);
    }

    /// Queue-proportional sample: output `j` is drawn with probability
    /// `len(j) / total()`. None when every queue is empty.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<PortId> {
        if self.sum == 0 {
            return None;
        }
        let r = rng.gen_range(0..self.sum);
        let output = self.bst.upper_bound(r);
        debug_assert!(self.lengths[output] > 0);
        Some(output)
    }

    /// Bulk preload used by tests and traffic front-ends; replaces the
    /// current contents.
    pub fn load(&mut self, lengths: &[u32]) {
        assert_eq!(lengths.len(), self.lengths.len());
        self.bst.zero();
        self.sum = 0;
        for (output, &len) in lengths.iter().enumerate() {
            let len = len.min(MAX_VOQ_LEN);
            self.lengths[output] = len;
            self.sum += len;
            self.bst.update(output, len as i32);
        }
    }

    /// Lengths, cached sum, and sampling tree must agree at all times.
    pub fn audit(&self) -> bool {
        let sum: u32 = self.lengths.iter().sum();
        sum == self.sum
            && self.bst.total() == self.sum
            && self
                .lengths
                .iter()
                .enumerate()
                .all(|(output, &len)| self.bst.leaf(output) == len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_add_remove_round_trip() {
        let mut voq = VoqState::new(4);
        assert!(voq.add(2));
        assert!(voq.add(2));
        assert!(voq.add(0));
        assert_eq!(voq.total(), 3);
        assert_eq!(voq.len(2), 2);
        voq.remove(2);
        assert_eq!(voq.len(2), 1);
        assert_eq!(voq.total(), 2);
        assert!(voq.audit());
    }

    #[test]
    fn test_saturation_drops() {
        let mut voq = VoqState::new(2);
        for _ in 0..MAX_VOQ_LEN {
            assert!(voq.add(1));
        }
        assert!(!voq.add(1));
        assert!(!voq.add(1));
        assert_eq!(voq.dropped(), 2);
        assert_eq!(voq.len(1), MAX_VOQ_LEN);
        assert!(voq.audit());
    }

    #[test]
    fn test_sample_follows_weights() {
        let mut voq = VoqState::new(8);
        let mut rng = Pcg64::seed_from_u64(7);
        assert_eq!(voq.sample(&mut rng), None);
        voq.add(5);
        // A single non-empty queue is always the sample.
        for _ in 0..16 {
            assert_eq!(voq.sample(&mut rng), Some(5));
        }
    }

    #[test]
    fn test_load_replaces_contents() {
        let mut voq = VoqState::new(3);
        voq.add(0);
        voq.load(&[4, 0, 2]);
        assert_eq!(voq.len(0), 4);
        assert_eq!(voq.len(1), 0);
        assert_eq!(voq.len(2), 2);
        assert_eq!(voq.total(), 6);
        assert!(voq.audit());
    }
}
