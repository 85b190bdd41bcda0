/*!
 * OS Simulation - Main Entry Point
 *
 * Walks the three simulations in order:
 * - Process lifecycle transitions in a registry
 * - FCFS, SJF and round-robin over the demo workload
 * - A producer/consumer session over a bounded buffer
 * - A writer/reader session over a message pipe
 */

use anyhow::Context;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use os_sim::ipc::{
    data_label, item_label, BoundedBuffer, Pipe, PipeEvent, RoleConfig, SyncEvent,
};
use os_sim::scheduler::{demo_workload, Fcfs, RoundRobin, SchedulingAlgorithm, Sjf};
use os_sim::{init_tracing_with, Pid, ProcessRegistry, ProcessResult, SimConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimConfig::from_env().context("invalid OSSIM_* configuration")?;

    // Initialize structured tracing
    init_tracing_with(config.trace_json);
    let run = Uuid::new_v4();
    info!(run = %run, ?config, "OS simulation starting");

    {
        let _span = info_span!("process_lifecycle", run = %run).entered();
        run_registry(&config)?;
    }

    {
        let _span = info_span!("cpu_scheduling", run = %run).entered();
        run_schedulers(&config)?;
    }

    run_bounded_buffer(&config).await?;
    run_pipe(&config).await?;

    info!(run = %run, "OS simulation finished");
    Ok(())
}

/// Drive one batch of processes through every transition
fn run_registry(config: &SimConfig) -> anyhow::Result<()> {
    let mut registry = ProcessRegistry::with_batch_size(config.batch_size);
    let mut transitions = registry.subscribe();

    let pids = registry.create_batch();
    info!(count = pids.len(), "processes created");

    let steps: [(&str, fn(&mut ProcessRegistry) -> ProcessResult<Pid>); 7] = [
        ("dispatch", ProcessRegistry::schedule_next),
        ("block", ProcessRegistry::block_running),
        ("dispatch", ProcessRegistry::schedule_next),
        ("finish", ProcessRegistry::finish_running),
        ("wake", ProcessRegistry::wake_first_blocked),
        ("dispatch", ProcessRegistry::schedule_next),
        // Rejected: a process is already running
        ("dispatch", ProcessRegistry::schedule_next),
    ];
    for (step, apply) in steps {
        match apply(&mut registry) {
            Ok(pid) => debug!(step, pid, "transition applied"),
            Err(e) => warn!(step, error = %e, "transition rejected"),
        }
    }

    for event in transitions.drain() {
        info!(%event, "transition");
    }

    let queues = registry.snapshot();
    info!(
        ready = ?queues.ready,
        running = ?queues.running,
        blocked = ?queues.blocked,
        terminated = ?queues.terminated,
        "queue state"
    );
    Ok(())
}

/// Run every algorithm over the demo workload
fn run_schedulers(config: &SimConfig) -> anyhow::Result<()> {
    let workload = demo_workload();
    let schedulers: [Box<dyn SchedulingAlgorithm>; 3] = [
        Box::new(Fcfs),
        Box::new(Sjf),
        Box::new(RoundRobin::new(config.rr_quantum)),
    ];

    for scheduler in &schedulers {
        let report = scheduler.schedule(&workload)?;
        for entry in &report.entries {
            debug!(
                algorithm = %report.algorithm,
                pid = entry.id,
                start = entry.start,
                finish = entry.finish,
                "slice"
            );
        }
        info!(
            algorithm = report.algorithm.label(),
            order = ?report.dispatch_order(),
            mean_wait = report.mean_wait,
            mean_turnaround = report.mean_turnaround,
            makespan = report.makespan(),
            "schedule computed"
        );
    }
    Ok(())
}

/// Run one producer/consumer session, logging its events as they arrive
async fn run_bounded_buffer(config: &SimConfig) -> anyhow::Result<()> {
    let buffer = BoundedBuffer::<String>::new(config.buffer_capacity);
    let events = buffer.subscribe();

    let roles = RoleConfig {
        max_items: config.items,
        cycle_delay: config.cycle_delay(),
    };
    let session = buffer
        .start(roles, item_label, |item| debug!(%item, "item delivered"))
        .context("failed to spawn producer/consumer threads")?;
    drop(buffer);

    let drain = tokio::spawn(async move {
        let mut snapshots = 0u64;
        while let Some(event) = events.recv_async().await {
            match event {
                SyncEvent::Snapshot(snap) => {
                    snapshots += 1;
                    debug!(
                        seq = snap.seq,
                        op = ?snap.op,
                        empty = snap.empty,
                        full = snap.full,
                        mutex = snap.mutex,
                        occupied = snap.occupied(),
                        "snapshot"
                    );
                }
                SyncEvent::Item(moved) => {
                    info!(role = %moved.role, slot = moved.slot, item = %moved.item, "item moved");
                }
                SyncEvent::Role(role) => {
                    info!(role = %role.role, phase = ?role.phase, items = role.items, "role");
                }
            }
        }
        snapshots
    });

    wait_or_interrupt(|| session.is_finished(), || session.stop()).await;

    let report = tokio::task::spawn_blocking(move || session.join()).await?;
    let snapshots = drain.await?;

    info!(
        session = %report.session,
        produced = report.producer.items,
        consumed = report.consumer.items,
        occupied = report.occupied,
        empty = report.counts.empty,
        full = report.counts.full,
        mutex = report.counts.mutex,
        snapshots,
        "bounded buffer session complete"
    );
    Ok(())
}

/// Stream one message pipe session, logging transfer progress
async fn run_pipe(config: &SimConfig) -> anyhow::Result<()> {
    let pipe = Pipe::<String>::default();
    let events = pipe.subscribe();

    let writer = RoleConfig {
        max_items: config.items,
        cycle_delay: config.cycle_delay(),
    };
    let session = pipe
        .start(writer, data_label, |message| debug!(%message, "message delivered"))
        .context("failed to spawn pipe threads")?;
    drop(pipe);

    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv_async().await {
            match event {
                PipeEvent::Sent { seq, message } => debug!(seq, %message, "pipe send"),
                PipeEvent::Received { seq, message } => info!(seq, %message, "pipe receive"),
                PipeEvent::Stats(stats) => debug!(
                    transferred = stats.transferred,
                    rate = stats.rate(),
                    "pipe throughput"
                ),
            }
        }
    });

    wait_or_interrupt(|| session.is_finished(), || session.stop()).await;

    let stats = tokio::task::spawn_blocking(move || session.join()).await?;
    drain.await?;

    info!(
        session = %stats.session,
        transferred = stats.transferred,
        rate = stats.rate(),
        "pipe session complete"
    );
    Ok(())
}

/// Poll `finished` until it holds, calling `stop` once on ctrl-c
async fn wait_or_interrupt(finished: impl Fn() -> bool, stop: impl Fn()) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signal_seen = false;
    let mut poll = tokio::time::interval(Duration::from_millis(20));
    loop {
        tokio::select! {
            result = &mut ctrl_c, if !signal_seen => {
                signal_seen = true;
                match result {
                    Ok(()) => {
                        info!("interrupt received, stopping session");
                        stop();
                        break;
                    }
                    Err(e) => warn!(error = %e, "ctrl-c handler unavailable"),
                }
            }
            _ = poll.tick() => {
                if finished() {
                    break;
                }
            }
        }
    }
}
