// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The per-host status state machine.

use peloton_core::error::{PelotonError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostStatus {
    Ready,
    Placing,
    Held,
    Reserved,
}

impl HostStatus {
    /// Whether `self -> next` is one of the allowed transitions:
    /// `Ready -> Placing`, `Placing -> Ready|Held`, `Ready <-> Held`,
    /// `Ready -> Reserved`, and the identity transition (`CasStatus(x, x)`
    /// is always a no-op success).
    pub fn can_transition_to(self, next: HostStatus) -> bool {
        use HostStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Ready, Placing) | (Placing, Ready) | (Placing, Held) | (Ready, Held) | (Held, Ready) | (Ready, Reserved)
        )
    }

    pub fn validate_transition(self, next: HostStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(PelotonError::InvalidArgument(format!(
                "invalid host status transition: {self:?} -> {next:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transition_is_always_valid() {
        for s in [HostStatus::Ready, HostStatus::Placing, HostStatus::Held, HostStatus::Reserved] {
            assert!(s.validate_transition(s).is_ok());
        }
    }

    #[test]
    fn ready_to_reserved_is_valid_but_reserved_to_held_is_not() {
        assert!(HostStatus::Ready.validate_transition(HostStatus::Reserved).is_ok());
        assert!(HostStatus::Reserved.validate_transition(HostStatus::Held).is_err());
    }

    #[test]
    fn placing_cannot_go_directly_to_reserved() {
        assert!(HostStatus::Placing.validate_transition(HostStatus::Reserved).is_err());
    }
}
