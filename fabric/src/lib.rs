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

mod batch;
pub mod checker;
mod config;
mod engine;
mod error;
mod ports;
mod sampler;
mod slots;
mod voq;
mod window;

// Public types
// type to use for logical time slots
pub type Cycle = usize;
// crossbar port index (inputs and outputs are both dense `0..N`)
pub type PortId = usize;
/// One crossbar configuration: `matching[output] = Some(input)`.
pub type Matching = Vec<Option<PortId>>;

pub use crate::batch::BatchMatcher;
pub use crate::config::{
    AcceptPolicy, SchedulerConfiguration, SchedulerKind, DEFAULT_FRAME_SIZE, DEFAULT_KNOCKOUT,
};
pub use crate::engine::{SchedulerStats, SwitchScheduler};
pub use crate::error::Error;
pub use crate::ports::{Accept, InputPort, OutputPort, Proposal};
pub use crate::sampler::WeightedBst;
pub use crate::slots::{FrameBitmap, SlotMask, FRAME_SIZE_BLOCK, MAX_WINDOW};
pub use crate::voq::{VoqState, MAX_VOQ_LEN};
pub use crate::window::SlidingWindow;
