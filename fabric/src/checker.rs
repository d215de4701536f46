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

//! Matching and conservation checks shared by debug assertions and tests.

use crate::{Matching, PortId};

/// A crossbar configuration is a matching when no input appears on two
/// outputs. Outputs are unique by construction (one entry each).
pub fn is_matching(matching: &[Option<PortId>]) -> bool {
    let mut seen = vec![false; matching.len()];
    for &input in matching.iter().flatten() {
        if input >= matching.len() || seen[input] {
            return false;
        }
        seen[input] = true;
    }
    true
}

pub fn matching_size(matching: &[Option<PortId>]) -> usize {
    matching.iter().flatten().count()
}

/// Running packet-conservation account: departures may never outrun
/// arrivals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    arrived: u64,
    departed: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_arrival(&mut self) {
        self.arrived += 1;
    }

    /// Account a graduated matching; returns its size.
    pub fn record_matching(&mut self, matching: &Matching) -> usize {
        let size = matching_size(matching);
        self.departed += size as u64;
        size
    }

    pub fn arrived(&self) -> u64 {
        self.arrived
    }

    pub fn departed(&self) -> u64 {
        self.departed
    }

    pub fn consistent(&self) -> bool {
        self.departed <= self.arrived
    }
}
