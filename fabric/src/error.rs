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

use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A scheduler needs at least one input and one output port.
    InvalidPortCount(usize),
    /// The window depth must be in `1..=MAX_WINDOW` slots.
    InvalidWindow(usize),
    /// The knockout threshold must admit at least one proposal.
    InvalidKnockout(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidPortCount(n) => {
                write!(f, "ERROR: Invalid port count {}", n)
            }
            Self::InvalidWindow(t) => {
                write!(
                    f,
                    "ERROR: Invalid window depth {} (must be 1..={})",
                    t,
                    crate::slots::MAX_WINDOW
                )
            }
            Self::InvalidKnockout(k) => {
                write!(f, "ERROR: Invalid knockout threshold {}", k)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
