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

use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::ports::{Accept, Proposal};
use crate::slots::SlotMask;
use crate::voq::VoqState;
use crate::PortId;

/// Input side of the sliding window: the port's virtual output queues,
/// its availability over the window, the output each in-flight slot is
/// bound to, and a private PRNG so per-port advancement is reproducible
/// under any interleaving of arrivals.
#[derive(Clone, Debug)]
pub struct InputPort {
    id: PortId,
    voq: VoqState,
    availability: SlotMask,
    bound: Vec<Option<PortId>>,
    rng: Pcg64,
}

impl InputPort {
    pub fn new(id: PortId, ports: usize, window: usize, seed: u64) -> Self {
        Self {
            id,
            voq: VoqState::new(ports),
            availability: SlotMask::all_free(window),
            bound: vec![None; window],
            rng: Pcg64::seed_from_u64(seed ^ id as u64),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn voq(&self) -> &VoqState {
        &self.voq
    }

    pub fn availability(&self) -> SlotMask {
        self.availability
    }

    pub fn add_packet(&mut self, output: PortId) -> bool {
        self.voq.add(output)
    }

    /// Bulk preload of every queue at once.
    pub fn load_traffic(&mut self, lengths: &[u32]) {
        self.voq.load(lengths);
    }

    fn bound_in_window(&self, output: PortId) -> bool {
        self.bound.iter().any(|slot| *slot == Some(output))
    }

    /// Queue-proportionally sample an output and offer it this port's
    /// availability. Outputs already bound somewhere in the window are
    /// suppressed, retrying up to one sample per port; without the
    /// suppression a long queue would keep over-proposing to an output
    /// that cannot accept it again.
    pub fn generate_proposal(&mut self) -> Option<Proposal> {
        for _ in 0..self.voq.ports() {
            let output = self.voq.sample(&mut self.rng)?;
            if !self.bound_in_window(output) {
                return Some(Proposal {
                    input: self.id,
                    output,
                    voq_len: self.voq.len(output),
                    availability: self.availability,
                });
            }
        }
        None
    }

    /// Claim the accepted slot and virtually depart the packet. The
    /// departure must happen here, not at graduation: the scheduled packet
    /// would otherwise be re-sampled while already committed, and the
    /// matured slot would then underflow the queue.
    pub fn process_accept(&mut self, accept: &Accept) {
        debug_assert_eq!(accept.input, self.id);
        debug_assert!(
            self.availability.is_free(accept.slot),
            "accept for an already-claimed slot {}",
            accept.slot
        );
        self.availability.mark(accept.slot);
        self.bound[accept.slot] = Some(accept.output);
        self.voq.remove(accept.output);
    }

    /// Slide the window: the senior slot matures into the crossbar and a
    /// fresh junior slot opens. Pure bookkeeping; the packet departed at
    /// accept time.
    pub fn graduate(&mut self) {
        self.bound.rotate_left(1);
        let junior = self.bound.len() - 1;
        self.bound[junior] = None;
        self.availability.shift_window();
    }
}
