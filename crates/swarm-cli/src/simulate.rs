//! `swarm run`: a full analysis against simulated agents.
//!
//! Each dispatched agent gets a tokio task that sleeps for a random time and
//! then completes, reports a crash, or vanishes without a word (left for the
//! health sweep to find).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use swarm_core::app::format_duration;
use swarm_core::domain::{SchedulerEvent, WorkerHandle};
use swarm_core::impls::{BroadcastEventSink, InMemoryBinary, SimulatedSwarm};
use swarm_core::ports::{SystemClock, UlidMinter};
use swarm_core::{SchedulerBuilder, SchedulerClient, SchedulerService, SwarmConfig};

#[derive(Args, Debug, Clone)]
pub struct SimulationOptions {
    /// Probability that an agent reports a crash
    #[arg(long, default_value_t = 0.1)]
    pub crash_rate: f64,

    /// Probability that an agent dies without reporting anything
    #[arg(long, default_value_t = 0.05)]
    pub silent_death_rate: f64,

    /// RNG seed for agent fates and run times
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 50)]
    pub min_job_ms: u64,

    #[arg(long, default_value_t = 400)]
    pub max_job_ms: u64,

    /// Print every event as a JSON line
    #[arg(long)]
    pub json: bool,
}

impl SimulationOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.crash_rate),
            "--crash-rate must be within 0..=1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.silent_death_rate),
            "--silent-death-rate must be within 0..=1"
        );
        ensure!(
            self.crash_rate + self.silent_death_rate <= 1.0,
            "--crash-rate and --silent-death-rate add up to more than 1"
        );
        ensure!(
            self.min_job_ms <= self.max_job_ms,
            "--min-job-ms is larger than --max-job-ms"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Fate {
    Complete,
    Crash,
    Vanish,
}

impl Fate {
    fn roll(rng: &mut StdRng, opts: &SimulationOptions) -> Self {
        let x: f64 = rng.r#gen();
        if x < opts.crash_rate {
            Fate::Crash
        } else if x < opts.crash_rate + opts.silent_death_rate {
            Fate::Vanish
        } else {
            Fate::Complete
        }
    }
}

pub async fn run(
    binary: Arc<InMemoryBinary>,
    config: SwarmConfig,
    opts: SimulationOptions,
) -> Result<()> {
    opts.validate()?;

    let swarm = Arc::new(SimulatedSwarm::new(UlidMinter::new(SystemClock)));
    let events = Arc::new(BroadcastEventSink::default());
    let mut event_rx = events.subscribe();

    let scheduler = SchedulerBuilder::new(config)
        .binary(binary)
        .workers(swarm.clone())
        .events(events)
        .build()?;
    let service = SchedulerService::spawn(scheduler);
    let client = service.client();

    let (stop_tx, stop_rx) = watch::channel(false);
    let driver = tokio::spawn(drive_agents(
        swarm.clone(),
        client.clone(),
        opts.clone(),
        stop_rx,
    ));

    client.start().await?;

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                report(&event, opts.json)?;
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
            Err(RecvError::Closed) => break,
        }
    }

    // ignore send error: the driver may have exited on its own
    let _ = stop_tx.send(true);
    if let Err(e) = driver.await {
        warn!(error = %e, "agent driver ended abnormally");
    }

    let progress = client.progress();
    let scheduler = service.shutdown().await?;
    scheduler.verify()?;

    if !opts.json {
        println!("{}", progress.summary());
    }
    info!(
        completed = progress.completed,
        failed = progress.failed,
        "simulation finished"
    );
    Ok(())
}

/// Watch for newly dispatched agents and give each one a fate.
async fn drive_agents(
    swarm: Arc<SimulatedSwarm>,
    client: SchedulerClient,
    opts: SimulationOptions,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut seen: HashSet<WorkerHandle> = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(10));

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                for agent in swarm.running() {
                    if !seen.insert(agent.handle.clone()) {
                        continue;
                    }
                    let fate = Fate::roll(&mut rng, &opts);
                    let delay = Duration::from_millis(rng.gen_range(opts.min_job_ms..=opts.max_job_ms));
                    debug!(handle = %agent.handle, target = %agent.target, ?fate, "agent started");
                    tokio::spawn(play(swarm.clone(), client.clone(), agent.handle, fate, delay));
                }
            }
        }
    }
}

async fn play(
    swarm: Arc<SimulatedSwarm>,
    client: SchedulerClient,
    handle: WorkerHandle,
    fate: Fate,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;

    let sent = match fate {
        Fate::Complete => {
            swarm.finish(&handle);
            client.notify_completed(handle.clone())
        }
        Fate::Crash => {
            swarm.kill(&handle);
            client.notify_crashed(handle.clone())
        }
        Fate::Vanish => {
            swarm.kill(&handle);
            Ok(())
        }
    };
    if let Err(e) = sent {
        debug!(%handle, error = %e, "notification dropped");
    }
}

fn report(event: &SchedulerEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        SchedulerEvent::Started { total } => println!("started: {total} functions queued"),
        SchedulerEvent::Progress {
            total,
            completed,
            active,
            percent_complete,
            completed_target: Some(target),
            ..
        } => println!(
            "[{percent_complete:5.1}%] done {target} ({completed}/{total}, {active} active)"
        ),
        SchedulerEvent::Progress { .. } => {}
        SchedulerEvent::Retry {
            target,
            attempt,
            max_retries,
            cause,
            ..
        } => println!("retry {target} ({attempt}/{max_retries}, {cause:?})"),
        SchedulerEvent::Failure {
            target, attempts, ..
        } => println!("FAILED {target} after {attempts} attempts"),
        SchedulerEvent::Completed {
            total,
            completed,
            failed,
            elapsed_seconds,
            stopped,
        } => println!(
            "{}: {completed}/{total} analyzed, {failed} failed, {}",
            if *stopped { "stopped" } else { "finished" },
            format_duration(*elapsed_seconds)
        ),
    }
    Ok(())
}
