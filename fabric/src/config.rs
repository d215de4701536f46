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

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Error;
use crate::slots::MAX_WINDOW;

/// Default knockout threshold: proposals per output considered per round.
pub const DEFAULT_KNOCKOUT: usize = 3;

/// Default batch frame length in slots.
pub const DEFAULT_FRAME_SIZE: usize = 16;

/// The matcher family run by a scheduler instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SchedulerKind {
    /// Sliding-window QPS: one matching graduates per slot.
    #[serde(rename = "sw_qps")]
    SwQps,
    /// Small-batch QPS over fixed frames.
    #[serde(rename = "sb_qps")]
    SbQps,
    /// Small-batch with the half-half rule; the runner-up back-fills only
    /// the immediately preceding slot.
    #[serde(rename = "sb_qps_hh_oblivious")]
    SbQpsHhOblivious,
    /// Small-batch half-half with availability-aware back-filling.
    #[serde(rename = "sb_qps_hh_aa")]
    SbQpsHhAa,
    /// Small-batch whose frames grow on demand during post-optimization.
    #[serde(rename = "sb_qps_adaptive")]
    SbQpsAdaptive,
}

impl Default for SchedulerKind {
    fn default() -> Self {
        Self::SwQps
    }
}

/// How an output resolves a current-slot contest between proposals.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptPolicy {
    /// Longest queue wins; ties go to the smaller input id.
    LongestFirst,
    /// Shortest queue wins; ties go to the smaller input id.
    ShortestFirst,
    /// First proposer wins.
    EarliestFirst,
    /// Equivalent to `EarliestFirst` under the shuffled proposing order.
    Random,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self::LongestFirst
    }
}

/// Parameters for a scheduler instance.
///
/// Constructed programmatically or read from a config file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfiguration {
    #[serde(default)]
    pub kind: SchedulerKind,
    /// Max proposals an output examines per round (sliding window only).
    #[serde(default = "default_knockout")]
    pub knockout: usize,
    /// Batch frame length in slots; 0 selects adaptive frames at the
    /// default base length.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default)]
    pub accept_policy: AcceptPolicy,
    /// Let contest losers retry earlier slots of the frame. Consulted for
    /// every accept policy.
    #[serde(default)]
    pub allow_retry_previous: bool,
    /// Propose/accept rounds per tick (sliding window only); 0 runs one
    /// round per window slot.
    #[serde(default)]
    pub iterations_per_slot: usize,
}

fn default_knockout() -> usize {
    DEFAULT_KNOCKOUT
}

fn default_frame_size() -> usize {
    DEFAULT_FRAME_SIZE
}

impl Default for SchedulerConfiguration {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            knockout: DEFAULT_KNOCKOUT,
            frame_size: DEFAULT_FRAME_SIZE,
            accept_policy: AcceptPolicy::default(),
            allow_retry_previous: false,
            iterations_per_slot: 0,
        }
    }
}

impl SchedulerConfiguration {
    pub fn from_str(config: &str) -> Self {
        serde_yaml::from_str(config).unwrap()
    }

    #[allow(dead_code)]
    pub fn from_file(file_name: &str) -> Self {
        let file = File::open(Path::new(file_name))
            .unwrap_or_else(|e| panic!("File {} not found. {:?}", file_name, e));
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).unwrap()
    }

    /// Frame length the batch matcher builds at; a configured 0 falls back
    /// to the default base so adaptive growth has somewhere to start.
    pub fn base_frame(&self) -> usize {
        if self.frame_size == 0 {
            DEFAULT_FRAME_SIZE
        } else {
            self.frame_size
        }
    }

    /// Frames may outgrow their base length during post-optimization.
    pub fn adaptive(&self) -> bool {
        match self.kind {
            SchedulerKind::SbQpsAdaptive => true,
            SchedulerKind::SwQps => false,
            _ => self.frame_size == 0,
        }
    }

    pub fn validate(&self, ports: usize, window: usize) -> Result<(), Error> {
        if ports == 0 {
            return Err(Error::InvalidPortCount(ports));
        }
        if self.kind == SchedulerKind::SwQps {
            if window == 0 || window > MAX_WINDOW {
                return Err(Error::InvalidWindow(window));
            }
            if self.knockout == 0 {
                return Err(Error::InvalidKnockout(self.knockout));
            }
        }
        Ok(())
    }
}
