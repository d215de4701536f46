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

mod input;
mod output;

pub use input::InputPort;
pub use output::OutputPort;

use crate::slots::SlotMask;
use crate::PortId;

/// One round's offer from an input to an output. Value record, passed by
/// copy; carries the target output explicitly so routing never has to be
/// inferred from queue lengths.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub input: PortId,
    pub output: PortId,
    /// Queue length toward `output` when the proposal was generated; the
    /// knockout filter ranks on it.
    pub voq_len: u32,
    /// The input's window availability at proposal time.
    pub availability: SlotMask,
}

/// An output's answer to a winning proposal, routed back to the input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Accept {
    pub output: PortId,
    pub input: PortId,
    pub slot: usize,
}
