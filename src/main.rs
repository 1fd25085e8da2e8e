mod blackboard; // vehicle pose, scan heartbeat and faults shared across threads
mod bus;        // broadcast topics
mod config;     // node configuration loading
mod monitor;    // safety monitor task
mod sim;        // simulated sensor and swarm

use blackboard::Blackboard;
use bus::Topic;
use config::{NodeConfig, ScanMode};
use sim::{CircuitDriver, SensorSim, SimWorld, circuit_phase};

use occupy_map::{CloudSnapshot, OccupyMap, ScanMailbox, ScanUpdate, SharedMap, service};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

/// Half-width (meters) of the simulated arena.
const ARENA_HALF_EXTENT: f64 = 4.5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("UGV mapper started.");

    let node_config = config::load_config(config::DEFAULT_CONFIG_PATH)?;
    match run(node_config).await {
        Ok(()) => {
            info!("Mapper tasks finished successfully.");
            Ok(())
        }
        Err(e) => {
            error!("Mapper tasks failed: {:?}", e);
            Err(e)
        }
    }
}

async fn run(node_config: NodeConfig) -> anyhow::Result<()> {
    let NodeConfig {
        map: map_config,
        vehicle,
        runtime,
    } = node_config;

    let map = OccupyMap::new(map_config.clone(), vehicle.id, vehicle.swarm_size)?;
    info!(
        vehicle = vehicle.id,
        swarm = vehicle.swarm_size,
        mode = ?runtime.scan_mode,
        windowed = map_config.window_capacity().is_some(),
        "Occupancy map created"
    );
    let shared: SharedMap = service::share(map);
    let bb: Blackboard = Arc::default();
    let snapshot_topic: Topic<CloudSnapshot> = Topic::new("clouds", 4);
    let (mailbox, scan_rx) = ScanMailbox::channel();

    let world = SimWorld::arena(ARENA_HALF_EXTENT, map_config.vehicle_height);
    if runtime.scan_mode == ScanMode::Global {
        info!(points = world.obstacles().len(), "Submitting global scan");
        mailbox.submit(ScanUpdate::Global(world.obstacles().to_vec()));
    }

    let driver_for = |id: u32| CircuitDriver {
        radius: runtime.drive_radius,
        speed: runtime.drive_speed,
        phase: circuit_phase(id, vehicle.swarm_size),
        height: map_config.vehicle_height,
    };
    let sensor = SensorSim {
        world,
        driver: driver_for(vehicle.id),
        peers: (1..=vehicle.swarm_size)
            .filter(|&id| id != vehicle.id)
            .map(|id| (id, driver_for(id)))
            .collect(),
        range: runtime.sensor_range,
        noise: runtime.noise_amplitude,
        world_frame: vehicle.sim_mode,
        emit_scans: runtime.scan_mode == ScanMode::Local,
    };

    info!("Spawning sensor thread...");
    std::thread::Builder::new()
        .name("sensor".into())
        .spawn({
            let map = Arc::clone(&shared);
            let bb = Arc::clone(&bb);
            let period = runtime.scan_period();
            move || sensor.run(mailbox, map, bb, period)
        })?;

    info!(topic = snapshot_topic.name(), "Starting map, publish and safety tasks...");
    tokio::try_join!(
        service::run_map_task(shared.clone(), scan_rx),
        service::run_publish_task(
            shared.clone(),
            runtime.publish_period(),
            snapshot_topic.sender()
        ),
        monitor::safety_task(
            shared.clone(),
            bb,
            snapshot_topic.subscribe(),
            runtime.safety_check_distance,
            runtime.monitor_period(),
            (runtime.scan_mode == ScanMode::Local).then(|| runtime.scan_timeout()),
        ),
    )?;

    Ok(())
}
