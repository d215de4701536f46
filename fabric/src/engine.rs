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

use serde::Serialize;
use std::fmt;

use crate::batch::BatchMatcher;
use crate::checker::{self, Ledger};
use crate::config::{SchedulerConfiguration, SchedulerKind};
use crate::error::Error;
use crate::voq::MAX_VOQ_LEN;
use crate::window::SlidingWindow;
use crate::{Matching, PortId};

/// Counters sampled from a running scheduler.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchedulerStats {
    /// Ticks advanced since construction or the last reset.
    pub cycles: u64,
    /// Matched pairs emitted into the crossbar.
    pub matches: u64,
    pub mean_match_size: f64,
    /// Longest virtual output queue right now.
    pub max_voq: u32,
    /// Arrivals dropped against saturated queues.
    pub dropped: u64,
    /// Clamped release-build invariant violations; always zero in a
    /// correct build.
    pub violations: u64,
    /// Queues are holding clear of the saturation threshold.
    pub stable: bool,
}

enum Core {
    Window(SlidingWindow),
    Batch(BatchMatcher),
}

/// The matching engine of one input-queued crossbar switch. Fully
/// deterministic for a given seed and arrival sequence; owns every port
/// exclusively and shares nothing.
pub struct SwitchScheduler {
    name: String,
    ports: usize,
    window: usize,
    seed: u64,
    config: SchedulerConfiguration,
    core: Core,
    ledger: Ledger,
    cycles: u64,
    /// Pre-fill rounds left before graduations start (sliding window in
    /// single-iteration mode only).
    warm: usize,
}

impl SwitchScheduler {
    /// Build a scheduler or reject the configuration outright; there is
    /// no partially constructed state.
    pub fn new(
        name: &str,
        ports: usize,
        window: usize,
        seed: u64,
        config: SchedulerConfiguration,
    ) -> Result<Self, Error> {
        config.validate(ports, window)?;
        let core = Self::build_core(ports, window, seed, &config);
        let warm = Self::warm_rounds(window, &config);
        Ok(Self {
            name: String::from(name),
            ports,
            window,
            seed,
            config,
            core,
            ledger: Ledger::new(),
            cycles: 0,
            warm,
        })
    }

    fn build_core(
        ports: usize,
        window: usize,
        seed: u64,
        config: &SchedulerConfiguration,
    ) -> Core {
        match config.kind {
            SchedulerKind::SwQps => {
                Core::Window(SlidingWindow::new(ports, window, config.knockout, seed))
            }
            _ => Core::Batch(BatchMatcher::new(ports, config, seed)),
        }
    }

    /// In the cheap one-round-per-tick mode the window starts empty, so
    /// the first `window` ticks only pre-fill it.
    fn warm_rounds(window: usize, config: &SchedulerConfiguration) -> usize {
        match config.kind {
            SchedulerKind::SwQps
                if config.iterations_per_slot > 0 && config.iterations_per_slot < window =>
            {
                window
            }
            _ => 0,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn ports(&self) -> usize {
        self.ports
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SchedulerConfiguration {
        &self.config
    }

    /// Record one packet arriving at `input` destined for `output`. Must
    /// precede the tick whose matching may serve it.
    pub fn add_arrival(&mut self, input: PortId, output: PortId) {
        assert!(input < self.ports && output < self.ports);
        let queued = match &mut self.core {
            Core::Window(window) => window.add_arrival(input, output),
            Core::Batch(batch) => batch.add_arrival(input, output),
        };
        if queued {
            self.ledger.record_arrival();
        }
    }

    /// Advance one slot of logical time and return the crossbar
    /// configuration for it: `matching[output] = Some(input)` or `None`.
    pub fn tick(&mut self) -> Matching {
        let matching = match &mut self.core {
            Core::Window(window) => {
                let rounds = if self.config.iterations_per_slot == 0 {
                    self.window
                } else {
                    self.config.iterations_per_slot
                };
                if self.warm > 0 {
                    window.run_iteration();
                    self.warm -= 1;
                    vec![None; self.ports]
                } else {
                    for _ in 0..rounds {
                        window.run_iteration();
                    }
                    window.graduate()
                }
            }
            Core::Batch(batch) => batch.tick(),
        };
        self.cycles += 1;
        let size = self.ledger.record_matching(&matching);
        debug_assert!(checker::is_matching(&matching));
        debug_assert!(self.ledger.consistent());
        debug_assert!(self.audit());
        log::trace!(
            "{}: cycle {} matched {} of {}",
            self.name,
            self.cycles,
            size,
            self.ports
        );
        matching
    }

    /// Zero all state and re-seed; a reset scheduler replays bit-for-bit
    /// under the same arrival sequence.
    pub fn reset(&mut self) {
        self.core = Self::build_core(self.ports, self.window, self.seed, &self.config);
        self.warm = Self::warm_rounds(self.window, &self.config);
        self.ledger = Ledger::new();
        self.cycles = 0;
    }

    pub fn stats(&self) -> SchedulerStats {
        let max_voq = self.max_voq();
        SchedulerStats {
            cycles: self.cycles,
            matches: self.ledger.departed(),
            mean_match_size: if self.cycles == 0 {
                0.0
            } else {
                self.ledger.departed() as f64 / self.cycles as f64
            },
            max_voq,
            dropped: self.dropped(),
            violations: self.underflows(),
            stable: max_voq < MAX_VOQ_LEN / 2,
        }
    }

    pub fn queue_length(&self, input: PortId, output: PortId) -> u32 {
        match &self.core {
            Core::Window(window) => window.queue_length(input, output),
            Core::Batch(batch) => batch.queue_length(input, output),
        }
    }

    pub fn occupancy(&self) -> Vec<Vec<u32>> {
        match &self.core {
            Core::Window(window) => window.occupancy(),
            Core::Batch(batch) => batch.occupancy(),
        }
    }

    fn max_voq(&self) -> u32 {
        match &self.core {
            Core::Window(window) => window.max_voq(),
            Core::Batch(batch) => batch.max_voq(),
        }
    }

    fn dropped(&self) -> u64 {
        match &self.core {
            Core::Window(window) => window.dropped(),
            Core::Batch(batch) => batch.dropped(),
        }
    }

    fn underflows(&self) -> u64 {
        match &self.core {
            Core::Window(window) => window.underflows(),
            Core::Batch(batch) => batch.underflows(),
        }
    }

    /// Internal queue books must balance at all times.
    pub fn audit(&self) -> bool {
        match &self.core {
            Core::Window(window) => window.audit(),
            Core::Batch(batch) => batch.audit(),
        }
    }

    /// Cross-check against the host's authoritative queue lengths. The
    /// engine's copy lags by the packets it has already committed inside
    /// the current window or frame, so it may run short but never long.
    pub fn audit_against<F>(&self, host_queue_length: F) -> bool
    where
        F: Fn(PortId, PortId) -> u32,
    {
        (0..self.ports).all(|input| {
            (0..self.ports)
                .all(|output| self.queue_length(input, output) <= host_queue_length(input, output))
        })
    }
}

impl fmt::Display for SwitchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "scheduler       : {}", self.name)?;
        writeln!(f, "kind            : {:?}", self.config.kind)?;
        writeln!(f, "ports           : {}", self.ports)?;
        match self.config.kind {
            SchedulerKind::SwQps => writeln!(f, "window          : {}", self.window)?,
            _ => writeln!(f, "frame           : {}", self.config.base_frame())?,
        }
        writeln!(f, "seed            : {}", self.seed)?;
        writeln!(f, "accepting policy: {:?}", self.config.accept_policy)
    }
}
