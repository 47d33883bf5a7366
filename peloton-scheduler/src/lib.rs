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

pub mod cluster;
pub mod event;
pub mod gang;
pub mod goalstate;
pub mod host;
pub mod queue;
pub mod ranker;
pub mod respool;

pub use cluster::{
    AbortMode, HostService, LeaderGuard, LocalLeader, ResourcePoolService, Scheduler, UpdateRecord, UpdateService,
    UpdateState,
};
pub use event::EventStream;
pub use gang::{Gang, Task};
pub use goalstate::GoalStateEngine;
pub use queue::GangQueue;
