use nalgebra::{Rotation3, Vector3};
use occupy_map::{AgentPose, Odometry, PointCloud, Position, ScanMailbox, ScanUpdate, SharedMap};
use rand::Rng;
use spin_sleep::SpinSleeper;
use std::{f64::consts::PI, time::Duration, time::Instant};
use tracing::{debug, info};

use crate::blackboard::{Blackboard, record_scan, set_pose};

/// Spacing (meters) between sampled obstacle surface points.
const SURFACE_SPACING: f64 = 0.1;

/// A static world made of sampled obstacle surfaces at a single height.
#[derive(Debug, Clone)]
pub struct SimWorld {
    obstacles: PointCloud,
}

impl SimWorld {
    /// Square room of half-width `half_extent` with a pillar at the center and two
    /// boxes in opposite corners.
    pub fn arena(half_extent: f64, height: f64) -> Self {
        let mut obstacles = PointCloud::new();

        let steps = (2.0 * half_extent / SURFACE_SPACING).round() as i64;
        for i in 0..=steps {
            let t = -half_extent + i as f64 * SURFACE_SPACING;
            obstacles.push(Position::new(t, -half_extent, height));
            obstacles.push(Position::new(t, half_extent, height));
            obstacles.push(Position::new(-half_extent, t, height));
            obstacles.push(Position::new(half_extent, t, height));
        }

        let pillar_radius = 0.3;
        let pillar_samples = (2.0 * PI * pillar_radius / SURFACE_SPACING).ceil() as usize;
        for k in 0..pillar_samples {
            let a = 2.0 * PI * k as f64 / pillar_samples as f64;
            obstacles.push(Position::new(
                pillar_radius * a.cos(),
                pillar_radius * a.sin(),
                height,
            ));
        }

        let corner = half_extent * 0.7;
        for (cx, cy) in [(corner, corner), (-corner, -corner)] {
            for i in 0..=5 {
                let t = -0.25 + i as f64 * SURFACE_SPACING;
                obstacles.push(Position::new(cx + t, cy - 0.25, height));
                obstacles.push(Position::new(cx + t, cy + 0.25, height));
                obstacles.push(Position::new(cx - 0.25, cy + t, height));
                obstacles.push(Position::new(cx + 0.25, cy + t, height));
            }
        }

        Self { obstacles }
    }

    pub fn obstacles(&self) -> &[Position] {
        &self.obstacles
    }

    /// Obstacle points within `range` of the vehicle, in the world frame.
    pub fn scan_world<R: Rng + ?Sized>(
        &self,
        odom: &Odometry,
        range: f64,
        noise: f64,
        rng: &mut R,
    ) -> PointCloud {
        let noise = noise.abs();
        self.obstacles
            .iter()
            .filter(|p| (*p - odom.position).xy().norm() <= range)
            .map(|p| {
                p + Vector3::new(
                    rng.random_range(-noise..=noise),
                    rng.random_range(-noise..=noise),
                    0.0,
                )
            })
            .collect()
    }

    /// Obstacle points within `range` of the vehicle, in the vehicle frame.
    pub fn scan_local<R: Rng + ?Sized>(
        &self,
        odom: &Odometry,
        range: f64,
        noise: f64,
        rng: &mut R,
    ) -> PointCloud {
        let inverse = Rotation3::from_axis_angle(&Vector3::z_axis(), -odom.yaw());
        self.scan_world(odom, range, noise, rng)
            .into_iter()
            .map(|p| inverse * (p - odom.position))
            .collect()
    }
}

/// Drives a vehicle counter-clockwise on a circle around the origin.
#[derive(Debug, Clone, Copy)]
pub struct CircuitDriver {
    pub radius: f64,
    pub speed: f64,
    pub phase: f64,
    pub height: f64,
}

impl CircuitDriver {
    /// Pose after `t` seconds, heading along the circle's tangent.
    pub fn pose_at(&self, t: f64) -> Odometry {
        let omega = if self.radius > 0.0 {
            self.speed / self.radius
        } else {
            0.0
        };
        let angle = self.phase + omega * t;
        Odometry::planar(
            self.radius * angle.cos(),
            self.radius * angle.sin(),
            self.height,
            angle + PI / 2.0,
        )
    }
}

/// Evenly spaced starting phase on the circuit for vehicle `id` in a swarm of `swarm_size`.
pub fn circuit_phase(id: u32, swarm_size: u32) -> f64 {
    let n = swarm_size.max(1) as f64;
    2.0 * PI * (id.saturating_sub(1) as f64) / n
}

/// One simulated tick: the vehicle pose, an optional scan, and peer poses.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub pose: Odometry,
    pub scan: Option<ScanUpdate>,
    pub peers: Vec<(u32, AgentPose)>,
}

/// Simulated onboard sensor and swarm telemetry.
pub struct SensorSim {
    pub world: SimWorld,
    pub driver: CircuitDriver,
    pub peers: Vec<(u32, CircuitDriver)>,
    pub range: f64,
    pub noise: f64,
    /// Emit scans already transformed into the world frame.
    pub world_frame: bool,
    /// Whether the sensor emits scans at all; a global map needs only poses.
    pub emit_scans: bool,
}

impl SensorSim {
    pub fn step<R: Rng + ?Sized>(&self, t: f64, rng: &mut R) -> SensorFrame {
        let pose = self.driver.pose_at(t);

        let scan = self.emit_scans.then(|| {
            if self.world_frame {
                ScanUpdate::World(self.world.scan_world(&pose, self.range, self.noise, rng))
            } else {
                ScanUpdate::Local {
                    scan: self.world.scan_local(&pose, self.range, self.noise, rng),
                    odom: pose,
                }
            }
        });

        let peers = self
            .peers
            .iter()
            .map(|(id, driver)| (*id, AgentPose::new(driver.pose_at(t).position, true)))
            .collect();

        SensorFrame { pose, scan, peers }
    }

    /// Runs the sensor loop on the calling thread until the mailbox closes.
    pub fn run(self, mailbox: ScanMailbox, map: SharedMap, bb: Blackboard, period: Duration) {
        info!(?period, peers = self.peers.len(), "Sensor thread started.");
        let sleeper = SpinSleeper::default();
        let mut rng = rand::rng();
        let start = Instant::now();

        loop {
            if mailbox.is_closed() {
                info!("Scan mailbox closed. Sensor thread stopping.");
                return;
            }

            let frame = self.step(start.elapsed().as_secs_f64(), &mut rng);
            dispatch(frame, &mailbox, &map, &bb);

            sleeper.sleep(period);
        }
    }
}

/// Hands one frame to its consumers: peer poses to the map, the scan to the
/// mailbox and the vehicle pose to the blackboard. The scan heartbeat only
/// advances when the frame carries a scan.
pub fn dispatch(frame: SensorFrame, mailbox: &ScanMailbox, map: &SharedMap, bb: &Blackboard) {
    if !frame.peers.is_empty() {
        map.write().update_peers(frame.peers);
    }

    set_pose(bb, frame.pose);
    if let Some(scan) = frame.scan {
        debug!(pose = %frame.pose, "Submitting scan");
        mailbox.submit(scan);
        record_scan(bb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use occupy_map::{MapConfig, OccupyMap, service};
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Arc;

    use crate::blackboard::snapshot;

    fn sim(world_frame: bool) -> SensorSim {
        SensorSim {
            world: SimWorld::arena(4.0, 0.1),
            driver: CircuitDriver {
                radius: 2.0,
                speed: 0.5,
                phase: 0.0,
                height: 0.1,
            },
            peers: vec![(
                2,
                CircuitDriver {
                    radius: 2.0,
                    speed: 0.5,
                    phase: PI,
                    height: 0.1,
                },
            )],
            range: 3.0,
            noise: 0.0,
            world_frame,
            emit_scans: true,
        }
    }

    #[test]
    fn test_circuit_driver_heads_along_tangent() {
        let driver = CircuitDriver {
            radius: 2.0,
            speed: 0.5,
            phase: 0.0,
            height: 0.1,
        };
        let start = driver.pose_at(0.0);
        assert!((start.position - Position::new(2.0, 0.0, 0.1)).norm() < 1e-9);
        assert!((start.yaw() - PI / 2.0).abs() < 1e-9);

        // A quarter lap takes (pi/2 * r) / v seconds.
        let quarter = driver.pose_at((PI / 2.0 * 2.0) / 0.5);
        assert!((quarter.position - Position::new(0.0, 2.0, 0.1)).norm() < 1e-9);
    }

    #[test]
    fn test_circuit_phase_spreads_swarm() {
        assert_eq!(circuit_phase(1, 4), 0.0);
        assert!((circuit_phase(3, 4) - PI).abs() < 1e-12);
        assert_eq!(circuit_phase(1, 0), 0.0);
    }

    #[test]
    fn test_local_scan_maps_back_onto_world_scan() {
        let sim = sim(false);
        let mut rng = StdRng::seed_from_u64(7);
        let frame = sim.step(1.5, &mut rng);

        let Some(ScanUpdate::Local { scan, odom }) = frame.scan else {
            panic!("expected a vehicle-frame scan");
        };
        let expected = sim.world.scan_world(&odom, sim.range, 0.0, &mut rng);
        let restored = odom.to_world(&scan);

        assert_eq!(restored.len(), expected.len());
        assert!(!restored.is_empty());
        for (a, b) in restored.iter().zip(expected.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_world_scan_respects_range_and_reports_peers() {
        let sim = sim(true);
        let mut rng = StdRng::seed_from_u64(11);
        let frame = sim.step(0.0, &mut rng);

        let Some(ScanUpdate::World(scan)) = frame.scan else {
            panic!("expected a world-frame scan");
        };
        assert!(scan.len() < sim.world.obstacles().len());
        assert!(
            scan.iter()
                .all(|p| (p - frame.pose.position).xy().norm() <= sim.range + 1e-9)
        );

        assert_eq!(frame.peers.len(), 1);
        let (id, peer) = frame.peers[0];
        assert_eq!(id, 2);
        assert!(peer.valid);
        assert!((peer.position - Position::new(-2.0, 0.0, 0.1)).norm() < 1e-9);
    }

    #[test]
    fn test_dispatch_counts_only_frames_with_scans() {
        let map = service::share(OccupyMap::new(MapConfig::default(), 1, 2).unwrap());
        let bb: Blackboard = Arc::default();
        let (mailbox, scan_rx) = ScanMailbox::channel();

        let mut pose_only = sim(true);
        pose_only.emit_scans = false;
        dispatch(pose_only.step(1.0, &mut rand::rng()), &mailbox, &map, &bb);

        let state = snapshot(&bb);
        assert_eq!(state.scans_sent, 0);
        assert!((state.pose.position - pose_only.driver.pose_at(1.0).position).norm() < 1e-9);
        assert!(!scan_rx.has_changed().unwrap());
        assert_eq!(map.read().peers().valid_peers().count(), 1);

        dispatch(sim(true).step(2.0, &mut rand::rng()), &mailbox, &map, &bb);
        assert_eq!(snapshot(&bb).scans_sent, 1);
        assert!(scan_rx.has_changed().unwrap());
    }

    #[test]
    fn test_pose_only_mode_emits_no_scan() {
        let mut sim = sim(true);
        sim.emit_scans = false;
        let frame = sim.step(0.0, &mut rand::rng());
        assert!(frame.scan.is_none());
    }
}
