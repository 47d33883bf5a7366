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

//! `peloton-cli`: the `respool`/`update`/`host` command surface,
//! bound in-process against a `Scheduler` handle rather than an RPC client,
//! since the agent/transport layer is out of scope for this build. Exit
//! codes follow `PelotonError::exit_code()`: 0 success, 1 usage, 2
//! NOT_FOUND, 3 INVALID_ARGUMENT, 4 FAILED_PRECONDITION, 5 INTERNAL.

use clap::{Parser, Subcommand};
use peloton_core::config::PelotonConfig;
use peloton_core::error::PelotonError;
use peloton_core::storage::MemStore;
use peloton_scheduler::cluster::{HostService, LocalLeader, ResourcePoolService, UpdateService};
use peloton_scheduler::ranker::LeastAllocatedRanker;
use peloton_scheduler::respool::{KindConfig, ResourceConfig, SchedulingPolicy};
use peloton_scheduler::Scheduler;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "peloton-cli", about = "Interact with a Peloton scheduler process")]
struct Cli {
    /// Path to a PelotonConfig YAML file; defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resource pool administration.
    Respool {
        #[command(subcommand)]
        action: RespoolAction,
    },
    /// Job config-update administration.
    Update {
        #[command(subcommand)]
        action: UpdateAction,
    },
    /// Host introspection and maintenance.
    Host {
        #[command(subcommand)]
        action: HostAction,
    },
}

#[derive(Subcommand)]
enum RespoolAction {
    Create {
        id: String,
        name: String,
        #[arg(long, default_value = "root")]
        parent: String,
        #[arg(long, default_value_t = 0.0)]
        cpu: f64,
        #[arg(long, default_value_t = 0.0)]
        mem: f64,
        #[arg(long, default_value_t = 0.0)]
        disk: f64,
        #[arg(long, default_value_t = 0.0)]
        gpu: f64,
    },
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    Update {
        id: String,
        #[arg(long, default_value_t = 0.0)]
        cpu: f64,
        #[arg(long, default_value_t = 0.0)]
        mem: f64,
        #[arg(long, default_value_t = 0.0)]
        disk: f64,
        #[arg(long, default_value_t = 0.0)]
        gpu: f64,
        #[arg(long)]
        force: bool,
    },
    Lookup {
        path: String,
    },
    Query,
}

#[derive(Subcommand)]
enum UpdateAction {
    Create {
        job_id: String,
        #[arg(long, default_value_t = 1)]
        goal_config_version: u64,
    },
    Get {
        update_id: String,
        #[arg(long)]
        status_only: bool,
    },
    List {
        job_id: String,
    },
    Pause {
        update_id: String,
    },
    Resume {
        update_id: String,
    },
    Rollback {
        update_id: String,
    },
    Abort {
        update_id: String,
        #[arg(long)]
        hard: bool,
    },
    GetCache,
}

#[derive(Subcommand)]
enum HostAction {
    Query,
    /// Marks a host `Held` ahead of maintenance, draining new placements.
    MaintenanceEnqueue {
        hostname: String,
    },
    /// Releases a maintenance hold, returning the host to `Ready`.
    MaintenanceComplete {
        hostname: String,
        pod_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match PelotonConfig::from_yaml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(e.exit_code() as u8);
            }
        },
        None => PelotonConfig::default(),
    };

    let scheduler = Scheduler::new(
        config.clone(),
        config.cluster_capacity,
        Arc::new(LeastAllocatedRanker::new()),
        Arc::new(MemStore::new()),
        Arc::new(LocalLeader),
    );

    match run(&scheduler, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(scheduler: &Scheduler, command: Command) -> Result<(), PelotonError> {
    match command {
        Command::Respool { action } => run_respool(scheduler, action).await,
        Command::Update { action } => run_update(scheduler, action).await,
        Command::Host { action } => run_host(scheduler, action).await,
    }
}

fn resource_config(cpu: f64, mem: f64, disk: f64, gpu: f64) -> ResourceConfig {
    let kind = |v: f64| KindConfig { reservation: v, limit: v, share: 1.0 };
    ResourceConfig { cpu: kind(cpu), mem: kind(mem), disk: kind(disk), gpu: kind(gpu) }
}

async fn run_respool(scheduler: &Scheduler, action: RespoolAction) -> Result<(), PelotonError> {
    match action {
        RespoolAction::Create { id, name, parent, cpu, mem, disk, gpu } => {
            let id = scheduler
                .create_pool(id, name, &parent, resource_config(cpu, mem, disk, gpu), SchedulingPolicy::PriorityFifo)
                .await?;
            println!("created resource pool {id}");
        }
        RespoolAction::Get { id } => {
            let descriptor = scheduler.get_pool(&id).await?;
            println!("{descriptor:#?}");
        }
        RespoolAction::Delete { id } => {
            scheduler.delete_pool(&id).await?;
            println!("deleted resource pool {id}");
        }
        RespoolAction::Update { id, cpu, mem, disk, gpu, force } => {
            scheduler.update_pool(&id, resource_config(cpu, mem, disk, gpu), force).await?;
            println!("updated resource pool {id}");
        }
        RespoolAction::Lookup { path } => {
            let id = scheduler.lookup_pool_by_path(&path).await?;
            println!("{id}");
        }
        RespoolAction::Query => {
            for descriptor in scheduler.query_pools().await? {
                println!("{} ({}) entitlement={:?} allocation={:?}", descriptor.path, descriptor.id, descriptor.entitlement, descriptor.allocation);
            }
        }
    }
    Ok(())
}

async fn run_update(scheduler: &Scheduler, action: UpdateAction) -> Result<(), PelotonError> {
    match action {
        UpdateAction::Create { job_id, goal_config_version } => {
            let update_id = scheduler.create_update(&job_id, goal_config_version).await?;
            println!("created update {update_id}");
        }
        UpdateAction::Get { update_id, status_only } => {
            let record = scheduler.get_update(&update_id, status_only).await?;
            println!("{record:#?}");
        }
        UpdateAction::List { job_id } => {
            for record in scheduler.list_updates(&job_id).await? {
                println!("{} {:?}", record.update_id, record.state);
            }
        }
        UpdateAction::Pause { update_id } => {
            scheduler.pause_update(&update_id).await?;
            println!("paused {update_id}");
        }
        UpdateAction::Resume { update_id } => {
            scheduler.resume_update(&update_id).await?;
            println!("resumed {update_id}");
        }
        UpdateAction::Rollback { update_id } => {
            scheduler.rollback_update(&update_id).await?;
            println!("rolled back {update_id}");
        }
        UpdateAction::Abort { update_id, hard } => {
            let mode = if hard { peloton_scheduler::cluster::AbortMode::Hard } else { peloton_scheduler::cluster::AbortMode::Soft };
            scheduler.abort_update(&update_id, mode).await?;
            println!("aborted {update_id}");
        }
        UpdateAction::GetCache => {
            for record in scheduler.get_update_cache().await? {
                println!("{} {} {:?}", record.update_id, record.job_id, record.state);
            }
        }
    }
    Ok(())
}

async fn run_host(scheduler: &Scheduler, action: HostAction) -> Result<(), PelotonError> {
    match action {
        HostAction::Query => {
            for summary in scheduler.host_summaries().await? {
                println!(
                    "{} status={:?} allocated={:?} available={:?}",
                    summary.hostname,
                    summary.status,
                    summary.allocated(),
                    summary.available()
                );
            }
        }
        HostAction::MaintenanceEnqueue { hostname } => {
            scheduler.host_cache.hold(&hostname, Vec::new(), chrono::Utc::now() + chrono::Duration::hours(1)).await?;
            println!("enqueued {hostname} for maintenance");
        }
        HostAction::MaintenanceComplete { hostname, pod_id } => {
            scheduler.host_cache.release_hold(&hostname, &pod_id).await?;
            println!("completed maintenance on {hostname}");
        }
    }
    Ok(())
}
