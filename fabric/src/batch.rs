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

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::checker;
use crate::config::{AcceptPolicy, SchedulerConfiguration, SchedulerKind};
use crate::slots::FrameBitmap;
use crate::voq::VoqState;
use crate::{Matching, PortId};

/// Small-batch QPS: matchings for a whole frame of slots are computed
/// together, one QPS round per slot, while the previously completed frame
/// drains into the crossbar one slot per tick.
///
/// The frame being built and the frame being drained overlap for exactly
/// one frame length in steady state. When adaptive post-optimization
/// grows a frame beyond its base length, the builder stalls after its
/// base-length worth of slots until the oversized frame finishes
/// draining, so capacity never leaks and memory stays bounded by the
/// largest single-frame overflow.
#[derive(Clone, Debug)]
pub struct BatchMatcher {
    ports: usize,
    frame: usize,
    half_half: bool,
    oblivious: bool,
    adaptive: bool,
    accept_policy: AcceptPolicy,
    allow_retry_previous: bool,
    rng: Pcg64,
    voq: Vec<VoqState>,
    match_in: Vec<FrameBitmap>,
    match_out: Vec<FrameBitmap>,
    /// Per-edge scan cursors; colored prefixes are never re-examined
    /// within a frame.
    next_try: Vec<Vec<usize>>,
    /// Frame under construction: `schedules[t][input] = output`.
    schedules: Vec<Vec<Option<PortId>>>,
    /// Completed frame draining into the crossbar.
    schedules_pre: Vec<Vec<Option<PortId>>>,
    build_slot: usize,
    drain_slot: usize,
}

impl BatchMatcher {
    pub fn new(ports: usize, config: &SchedulerConfiguration, seed: u64) -> Self {
        assert!(ports >= 1);
        let frame = config.base_frame();
        let half_half = matches!(
            config.kind,
            SchedulerKind::SbQpsHhOblivious | SchedulerKind::SbQpsHhAa
        );
        Self {
            ports,
            frame,
            half_half,
            oblivious: config.kind == SchedulerKind::SbQpsHhOblivious,
            adaptive: config.adaptive(),
            accept_policy: config.accept_policy,
            allow_retry_previous: config.allow_retry_previous,
            rng: Pcg64::seed_from_u64(seed),
            voq: (0..ports).map(|_| VoqState::new(ports)).collect(),
            match_in: vec![FrameBitmap::with_len(frame); ports],
            match_out: vec![FrameBitmap::with_len(frame); ports],
            next_try: vec![vec![0; ports]; ports],
            schedules: vec![vec![None; ports]; frame],
            schedules_pre: Vec::new(),
            build_slot: 0,
            drain_slot: 0,
        }
    }

    pub fn ports(&self) -> usize {
        self.ports
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn add_arrival(&mut self, input: PortId, output: PortId) -> bool {
        self.voq[input].add(output)
    }

    /// Advance one slot: emit the next drained matching, run one QPS
    /// round into the frame under construction, and close the frame once
    /// it is fully built and its predecessor fully drained.
    pub fn tick(&mut self) -> Matching {
        let matching = self.drain();
        if self.build_slot < self.frame {
            self.run_slot(self.build_slot);
            self.build_slot += 1;
        }
        if self.build_slot == self.frame && self.drain_slot >= self.schedules_pre.len() {
            self.close_frame();
        }
        matching
    }

    fn drain(&mut self) -> Matching {
        let mut matching: Matching = vec![None; self.ports];
        if self.drain_slot < self.schedules_pre.len() {
            for input in 0..self.ports {
                if let Some(output) = self.schedules_pre[self.drain_slot][input].take() {
                    debug_assert!(matching[output].is_none());
                    matching[output] = Some(input);
                }
            }
            self.drain_slot += 1;
        }
        debug_assert!(checker::is_matching(&matching));
        matching
    }

    /// Outputs may take a second proposal during the back half of a frame
    /// to back-fill holes left earlier.
    fn accepts_for_slot(&self, slot: usize) -> usize {
        if self.half_half && 2 * (slot + 1) > self.frame {
            2
        } else {
            1
        }
    }

    /// Whether candidate `a` is ranked ahead of `b` in an output's
    /// contest.
    fn outranks(&self, a: (PortId, u32), b: (PortId, u32)) -> bool {
        match self.accept_policy {
            AcceptPolicy::LongestFirst => a.1 > b.1 || (a.1 == b.1 && a.0 < b.0),
            AcceptPolicy::ShortestFirst => a.1 < b.1 || (a.1 == b.1 && a.0 < b.0),
            AcceptPolicy::EarliestFirst | AcceptPolicy::Random => false,
        }
    }

    /// One QPS round for slot `t` of the frame under construction.
    fn run_slot(&mut self, t: usize) {
        let max_accepts = self.accepts_for_slot(t);
        let losers_retry = self.allow_retry_previous && !self.oblivious;

        let mut order: Vec<PortId> = (0..self.ports).collect();
        order.shuffle(&mut self.rng);

        // Proposing: every backlogged input samples one output. Outputs
        // hold a ranked shortlist; whoever falls off it may immediately
        // retry an earlier slot.
        let mut contest: Vec<Vec<(PortId, u32)>> = vec![Vec::new(); self.ports];
        for &input in order.iter() {
            if self.voq[input].total() == 0 {
                continue;
            }
            let output = match self.voq[input].sample(&mut self.rng) {
                Some(output) => output,
                None => continue,
            };
            let candidate = (input, self.voq[input].len(output));
            let list = &mut contest[output];
            let position = list
                .iter()
                .position(|&incumbent| self.outranks(candidate, incumbent))
                .unwrap_or(list.len());
            list.insert(position, candidate);
            if list.len() > max_accepts {
                let (loser, _) = list.pop().expect("shortlist cannot be empty here");
                if losers_retry {
                    self.retry_previous(loser, output, t);
                }
            }
        }

        // Accepting: the shortlist head binds the current slot; in the
        // back half a runner-up back-fills an earlier hole.
        for output in 0..self.ports {
            let shortlist = std::mem::take(&mut contest[output]);
            for (rank, (input, _)) in shortlist.into_iter().enumerate() {
                if rank == 0 {
                    self.bind(input, output, t);
                } else if t > 0 {
                    let slot = if self.oblivious {
                        let previous = t - 1;
                        (!self.match_in[input].is_set(previous)
                            && !self.match_out[output].is_set(previous))
                        .then_some(previous)
                    } else {
                        self.match_in[input].last_free_pair(&self.match_out[output], t)
                    };
                    if let Some(slot) = slot {
                        self.bind(input, output, slot);
                    }
                }
            }
        }
        log::trace!("built frame slot {} ({} accepts max)", t, max_accepts);
    }

    /// Commit `input -> output` at `slot` of the frame under construction
    /// and virtually depart the packet.
    fn bind(&mut self, input: PortId, output: PortId, slot: usize) {
        debug_assert!(self.schedules[slot][input].is_none());
        debug_assert!(!self.match_in[input].is_set(slot));
        debug_assert!(!self.match_out[output].is_set(slot));
        self.match_in[input].set(slot);
        self.match_out[output].set(slot);
        self.schedules[slot][input] = Some(output);
        self.voq[input].remove(output);
    }

    /// A contest loser scans forward from its cursor for the earliest
    /// hole strictly before `slot` that is free on both sides.
    fn retry_previous(&mut self, input: PortId, output: PortId, slot: usize) {
        let start = self.next_try[input][output];
        if start >= slot {
            return;
        }
        if let Some(found) = self.match_in[input].first_free_pair(&self.match_out[output], start, slot)
        {
            self.bind(input, output, found);
            self.next_try[input][output] = found + 1;
        }
    }

    /// Serve as much of the leftover backlog as the frame still has room
    /// for: collect every remaining edge, shuffle, and greedily color each
    /// at the earliest slot free on both sides, resuming from the edge's
    /// cursor. In adaptive mode the frame grows instead of giving up.
    fn post_optimization(&mut self) {
        let ports = self.ports;
        let mut remaining: Vec<(PortId, PortId)> = (0..ports)
            .cartesian_product(0..ports)
            .flat_map(|(input, output)| {
                std::iter::repeat((input, output)).take(self.voq[input].len(output) as usize)
            })
            .collect();
        remaining.shuffle(&mut self.rng);
        log::debug!("post-optimization over {} leftover packets", remaining.len());

        for (input, output) in remaining {
            let mut start = self.next_try[input][output];
            let slot = loop {
                let limit = self.match_in[input].len().min(self.match_out[output].len());
                match self.match_in[input].first_free_pair(&self.match_out[output], start, limit) {
                    Some(slot) => break Some(slot),
                    None if self.adaptive => {
                        // Extend both edges past the longer bitmap; the
                        // fresh region is free on at least one side, so
                        // the scan terminates within one more block.
                        let longer =
                            self.match_in[input].len().max(self.match_out[output].len());
                        self.match_in[input].grow_to(longer + 1);
                        self.match_out[output].grow_to(longer + 1);
                        start = start.max(limit);
                    }
                    None => break None,
                }
            };
            if let Some(slot) = slot {
                if slot >= self.schedules.len() {
                    self.schedules.resize(slot + 1, vec![None; ports]);
                }
                self.bind(input, output, slot);
                self.next_try[input][output] = slot + 1;
            }
        }

        for row in self.next_try.iter_mut() {
            row.iter_mut().for_each(|cursor| *cursor = 0);
        }
    }

    /// Post-optimize the finished frame, hand it to the drain side, and
    /// start a fresh base-length frame.
    fn close_frame(&mut self) {
        self.post_optimization();
        self.schedules_pre =
            std::mem::replace(&mut self.schedules, vec![vec![None; self.ports]; self.frame]);
        for bitmap in self.match_in.iter_mut().chain(self.match_out.iter_mut()) {
            bitmap.reset(self.frame);
        }
        self.build_slot = 0;
        self.drain_slot = 0;
        log::debug!(
            "frame closed: {} slots queued for drain",
            self.schedules_pre.len()
        );
    }

    pub fn occupancy(&self) -> Vec<Vec<u32>> {
        self.voq
            .iter()
            .map(|voq| (0..self.ports).map(|output| voq.len(output)).collect())
            .collect()
    }

    pub fn queue_length(&self, input: PortId, output: PortId) -> u32 {
        self.voq[input].len(output)
    }

    pub fn max_voq(&self) -> u32 {
        self.voq.iter().map(VoqState::max_len).max().unwrap_or(0)
    }

    pub fn dropped(&self) -> u64 {
        self.voq.iter().map(VoqState::dropped).sum()
    }

    pub fn underflows(&self) -> u64 {
        self.voq.iter().map(VoqState::underflows).sum()
    }

    pub fn audit(&self) -> bool {
        self.voq.iter().all(VoqState::audit)
    }
}
