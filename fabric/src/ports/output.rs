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

use crate::ports::{Accept, Proposal};
use crate::slots::SlotMask;
use crate::PortId;

/// Output side of the sliding window: a calendar of input bindings over
/// the window slots and the matching availability mask. The calendar
/// entry for a slot is `None` exactly when the slot's availability bit is
/// set.
#[derive(Clone, Debug)]
pub struct OutputPort {
    id: PortId,
    schedule: Vec<Option<PortId>>,
    availability: SlotMask,
    knockout: usize,
}

impl OutputPort {
    pub fn new(id: PortId, window: usize, knockout: usize) -> Self {
        assert!(knockout >= 1);
        Self {
            id,
            schedule: vec![None; window],
            availability: SlotMask::all_free(window),
            knockout,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn availability(&self) -> SlotMask {
        self.availability
    }

    pub fn schedule(&self) -> &[Option<PortId>] {
        &self.schedule
    }

    /// Knockout, then first-fit accept. Proposals are ranked by queue
    /// length (longest first, ties to the smaller input id), only the top
    /// `knockout` survive, and the first survivor with a mutually free
    /// slot is bound at the earliest such slot. At most one accept per
    /// round.
    pub fn process_proposals(&mut self, proposals: &mut Vec<Proposal>) -> Option<Accept> {
        if proposals.is_empty() {
            return None;
        }
        proposals.sort_by(|a, b| b.voq_len.cmp(&a.voq_len).then(a.input.cmp(&b.input)));
        for prop in proposals.iter().take(self.knockout) {
            debug_assert_eq!(prop.output, self.id);
            if let Some(slot) = SlotMask::first_fit(prop.availability, self.availability) {
                self.schedule[slot] = Some(prop.input);
                self.availability.mark(slot);
                return Some(Accept {
                    output: self.id,
                    input: prop.input,
                    slot,
                });
            }
        }
        None
    }

    /// Commit the senior slot and slide the calendar. Returns the input
    /// bound there, if any.
    pub fn graduate(&mut self) -> Option<PortId> {
        let senior = self.schedule[0];
        self.schedule.rotate_left(1);
        let junior = self.schedule.len() - 1;
        self.schedule[junior] = None;
        self.availability.shift_window();
        senior
    }

    /// Calendar entries and availability bits must mirror each other.
    pub fn audit(&self) -> bool {
        self.schedule
            .iter()
            .enumerate()
            .all(|(slot, entry)| entry.is_none() == self.availability.is_free(slot))
    }
}
