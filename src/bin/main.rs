use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sortcell::sim::{FixedClassifier, ScriptedDetections, SimArm, SimGripper};
use sortcell::{
    ArmCoordinator, BinId, CellConfig, CellController, GripCommand, GripperTransport,
    MotionTransport, Scheduler,
};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sortcell")]
#[command(about = "Pick-and-place coordinator for a waste-sorting robot cell")]
struct Cli {
    /// Path to a cell config file (otherwise resolved via SORTCELL_CONFIG,
    /// XDG config dir, or ./cell.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated cell end to end: scripted detections, simulated arm
    /// and gripper, full pick-and-place chains
    Simulate {
        /// Number of objects to detect, pick, and place
        #[arg(short, long, default_value_t = 3)]
        objects: usize,
        /// Off-centre readings per object before it reads centred
        #[arg(long, default_value_t = 2)]
        drift: usize,
    },
    /// Print the resolved configuration
    CheckConfig,
    /// Drive one grip command through the scheduler against the simulated
    /// gripper (validates the command string first)
    Grip {
        /// "open" or "close"
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sortcell=info".parse()?))
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CellConfig::load_from(path)?,
        None => CellConfig::load()?,
    };

    match cli.command {
        Commands::Simulate { objects, drift } => simulate(config, objects, drift).await,
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Grip { command } => grip(config, &command).await,
    }
}

async fn simulate(config: CellConfig, objects: usize, drift: usize) -> Result<()> {
    info!(objects, drift, "starting simulated cell");

    let (scheduler, worker) = Scheduler::new(config.scheduler.to_scheduler_config());
    let worker_handle = worker.spawn();

    let arm = Arc::new(SimArm::new());
    let gripper = Arc::new(SimGripper::new());
    let coordinator = ArmCoordinator::new(
        scheduler.clone(),
        Arc::clone(&arm) as Arc<dyn MotionTransport>,
        Arc::clone(&gripper) as Arc<dyn GripperTransport>,
        config.gripper.dwell(),
    );

    let mut detections = ScriptedDetections::new();
    for i in 0..objects {
        detections.push_drifting_object(430.0 + 25.0 * i as f64, 655.0 - 10.0 * i as f64, drift);
    }
    let classifier = FixedClassifier::cycling(
        config.bins.keys().map(|index| BinId::new(*index)).collect(),
    );

    let mut cell = CellController::new(
        config,
        scheduler.clone(),
        coordinator,
        detections,
        classifier,
    );
    cell.startup()?;

    let mut placed = 0;
    while placed < objects {
        match cell.process_frame().await {
            Ok(Some(id)) => {
                // wait for the whole chain, gate release included
                let settled = scheduler.barrier()?;
                settled.await?;
                placed += 1;
                info!(workflow = %id, placed, "object placed");
            }
            Ok(None) => {
                // camera frame cadence
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(err) => {
                warn!(%err, "frame processing failed");
                let settled = scheduler.barrier()?;
                settled.await?;
            }
        }
    }

    info!(
        placed,
        grip_commands = gripper.commands().len(),
        final_pose = %arm.pose(),
        "simulation complete"
    );

    drop(cell);
    drop(scheduler);
    worker_handle.await??;
    Ok(())
}

async fn grip(config: CellConfig, raw: &str) -> Result<()> {
    // contract violation surfaces here, before anything is scheduled
    let command: GripCommand = raw.parse()?;

    let (scheduler, worker) = Scheduler::new(config.scheduler.to_scheduler_config());
    let worker_handle = worker.spawn();

    let gripper = Arc::new(SimGripper::new());
    let coordinator = ArmCoordinator::new(
        scheduler.clone(),
        Arc::new(SimArm::new()) as Arc<dyn MotionTransport>,
        Arc::clone(&gripper) as Arc<dyn GripperTransport>,
        config.gripper.dwell(),
    );

    coordinator.actuate_and_dwell(command)?;
    let done = scheduler.barrier()?;
    done.await?;

    println!(
        "sent `{}` ({}) and dwelled {} ms",
        command,
        command.wire_name(),
        config.gripper.dwell_ms
    );

    drop(coordinator);
    drop(scheduler);
    worker_handle.await??;
    Ok(())
}
