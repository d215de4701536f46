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

use crate::checker;
use crate::ports::{InputPort, OutputPort, Proposal};
use crate::{Matching, PortId};

/// Sliding-window QPS: N input ports and N output ports jointly fill a
/// window of upcoming matchings. Each round every input proposes once,
/// every output accepts at most once, and a graduation commits the senior
/// slot of every calendar as the next crossbar configuration.
#[derive(Clone, Debug)]
pub struct SlidingWindow {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    window: usize,
    iterations: u64,
    graduations: u64,
}

impl SlidingWindow {
    pub fn new(ports: usize, window: usize, knockout: usize, seed: u64) -> Self {
        Self {
            inputs: (0..ports)
                .map(|id| InputPort::new(id, ports, window, seed))
                .collect(),
            outputs: (0..ports)
                .map(|id| OutputPort::new(id, window, knockout))
                .collect(),
            window,
            iterations: 0,
            graduations: 0,
        }
    }

    pub fn ports(&self) -> usize {
        self.inputs.len()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn add_arrival(&mut self, input: PortId, output: PortId) -> bool {
        self.inputs[input].add_packet(output)
    }

    /// Preload the whole VOQ matrix; row `i` holds input `i`'s lengths.
    pub fn load_traffic(&mut self, matrix: &[Vec<u32>]) {
        assert_eq!(matrix.len(), self.inputs.len());
        for (input, row) in self.inputs.iter_mut().zip(matrix) {
            input.load_traffic(row);
        }
    }

    /// One propose/accept round. The propose phase completes over all
    /// inputs before any output accepts; proposals fan into per-output
    /// buckets keyed by the explicit target carried in each proposal.
    pub fn run_iteration(&mut self) {
        let ports = self.ports();
        let mut buckets: Vec<Vec<Proposal>> = vec![Vec::new(); ports];
        for input in self.inputs.iter_mut() {
            if let Some(prop) = input.generate_proposal() {
                debug_assert!(prop.output < ports);
                buckets[prop.output].push(prop);
            }
        }
        for (output, bucket) in self.outputs.iter_mut().zip(buckets.iter_mut()) {
            if let Some(accept) = output.process_proposals(bucket) {
                self.inputs[accept.input].process_accept(&accept);
            }
        }
        self.iterations += 1;
        log::trace!(
            "iteration {}: {} proposals pending",
            self.iterations,
            buckets.iter().map(|b| b.len()).sum::<usize>()
        );
    }

    /// Commit the senior slot across all calendars and slide every window,
    /// matched or not. The result maps each output to its input.
    pub fn graduate(&mut self) -> Matching {
        let mut matching: Matching = vec![None; self.ports()];
        for (entry, output) in matching.iter_mut().zip(self.outputs.iter_mut()) {
            *entry = output.graduate();
        }
        for input in self.inputs.iter_mut() {
            input.graduate();
        }
        self.graduations += 1;
        debug_assert!(checker::is_matching(&matching));
        debug_assert!(self.audit());
        matching
    }

    pub fn occupancy(&self) -> Vec<Vec<u32>> {
        self.inputs
            .iter()
            .map(|input| {
                (0..self.ports())
                    .map(|output| input.voq().len(output))
                    .collect()
            })
            .collect()
    }

    pub fn queue_length(&self, input: PortId, output: PortId) -> u32 {
        self.inputs[input].voq().len(output)
    }

    pub fn max_voq(&self) -> u32 {
        self.inputs
            .iter()
            .map(|input| input.voq().max_len())
            .max()
            .unwrap_or(0)
    }

    pub fn dropped(&self) -> u64 {
        self.inputs.iter().map(|input| input.voq().dropped()).sum()
    }

    pub fn underflows(&self) -> u64 {
        self.inputs
            .iter()
            .map(|input| input.voq().underflows())
            .sum()
    }

    pub fn audit(&self) -> bool {
        self.inputs.iter().all(|input| input.voq().audit())
            && self.outputs.iter().all(|output| output.audit())
    }
}
