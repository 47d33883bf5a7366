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

use thiserror::Error;

/// The closed set of error kinds surfaced across the scheduler core.
///
/// User-invoked RPCs (or their in-process equivalents) surface these
/// directly; the goal-state engine never propagates them upward, it
/// records them for backoff accounting instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PelotonError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unknown: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, PelotonError>;

impl PelotonError {
    /// Maps to the CLI exit codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            PelotonError::InvalidArgument(_) => 3,
            PelotonError::NotFound(_) => 2,
            PelotonError::AlreadyExists(_) => 3,
            PelotonError::FailedPrecondition(_) => 4,
            PelotonError::Unavailable(_) => 4,
            PelotonError::Internal(_) => 5,
            PelotonError::Unknown(_) => 5,
        }
    }
}
