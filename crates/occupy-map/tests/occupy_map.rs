use occupy_map::accumulator::{PointReducer, SlideWindow};
use occupy_map::{
    AgentPose, Lookup, MapConfig, MergeOutcome, Occupancy, OccupyMap, Odometry, PointCloud,
    Position, VoxelIndex,
};

/// Leaves scans untouched so window contents can be compared exactly.
struct KeepAll;

impl PointReducer for KeepAll {
    fn reduce(&self, points: &[Position], _leaf_size: f64) -> PointCloud {
        points.to_vec()
    }
}

fn unit_config() -> MapConfig {
    MapConfig {
        origin: [0.0, 0.0, 0.0],
        size: [10.0, 10.0, 2.0],
        resolution: 1.0,
        self_inflation: 1.0,
        obstacle_inflation: 1.0,
        cost_margin_cells: 1,
        vehicle_height: 1.0,
        vertical_band_cells: 1,
        ..MapConfig::default()
    }
}

fn wall(x: f64, y_from: f64, y_to: f64, step: f64) -> PointCloud {
    let mut points = PointCloud::new();
    let mut y = y_from;
    while y <= y_to {
        points.push(Position::new(x, y, 0.1));
        y += step;
    }
    points
}

#[test]
fn test_reference_indices() {
    let map = OccupyMap::new(unit_config(), 1, 1).unwrap();
    let first = map.position_to_index(&Position::new(0.1, 0.1, 0.1));
    let last = map.position_to_index(&Position::new(9.9, 9.9, 1.9));
    assert_eq!(first, VoxelIndex::new(0, 0, 0));
    assert_eq!(last, VoxelIndex::new(9, 9, 1));
    assert_eq!(map.grid().linear_index(&last), Some(199));
}

#[test]
fn test_window_of_three_keeps_last_three_scans() {
    let config = MapConfig {
        window_size: 3,
        ..unit_config()
    };
    let mut map = OccupyMap::with_reducer(config, 1, 1, Box::new(KeepAll)).unwrap();
    let scans: Vec<PointCloud> = (0..4)
        .map(|i| vec![Position::new(1.5 + 2.0 * i as f64, 5.5, 1.5)])
        .collect();
    for scan in &scans {
        map.ingest_world(scan.clone());
    }

    let mut raw = map.raw_cloud().to_vec();
    raw.sort_by(|a, b| a.x.total_cmp(&b.x));
    let expected: PointCloud = scans[1..].iter().flatten().copied().collect();
    assert_eq!(raw, expected);

    // The evicted scan no longer marks the grid
    assert_eq!(
        map.occupancy_at(&Position::new(0.5, 6.5, 1.5)),
        Lookup::InBounds(Occupancy::Free)
    );
    assert_eq!(
        map.occupancy_at(&Position::new(8.5, 6.5, 1.5)),
        Lookup::InBounds(Occupancy::Occupied)
    );
}

#[test]
fn test_slide_window_standalone() {
    let mut window = SlideWindow::new(2);
    window.insert(vec![Position::new(1.0, 0.0, 0.0)]);
    window.insert(vec![Position::new(2.0, 0.0, 0.0)]);
    window.insert(vec![Position::new(3.0, 0.0, 0.0)]);
    let mut xs: Vec<f64> = window.concat().iter().map(|p| p.x).collect();
    xs.sort_by(f64::total_cmp);
    assert_eq!(xs, vec![2.0, 3.0]);
}

#[test]
fn test_global_map_with_peer_and_safety() {
    let config = MapConfig {
        origin: [-5.0, -5.0, -0.5],
        size: [10.0, 10.0, 2.0],
        resolution: 0.2,
        ..MapConfig::default()
    };
    let mut map = OccupyMap::new(config, 1, 2).unwrap();
    map.update_peer(2, AgentPose::new(Position::new(-3.0, -3.0, 0.1), true));

    assert!(map.ingest_global(wall(2.0, -3.0, 3.0, 0.05)).is_merged());
    assert_eq!(
        map.ingest_global(wall(-2.0, -3.0, 3.0, 0.05)),
        MergeOutcome::AlreadyLatched
    );

    // Next to the wall and on top of the peer footprint is unsafe, open space is safe
    assert!(!map.check_safety(&Position::new(1.9, 0.0, 0.1), 0.4));
    assert!(!map.check_safety(&Position::new(-3.0, -3.0, 0.1), 0.8));
    assert!(map.check_safety(&Position::new(-1.0, 1.0, 0.1), 0.4));
    // Neighborhood reaching past the map edge is unsafe
    assert!(!map.check_safety(&Position::new(-4.9, 0.0, 0.1), 0.4));

    // Costs are raised around the wall and never negative in the map
    let near = map.cost_at(&Position::new(2.0 - 7.0 * 0.2, 0.0, 0.1));
    assert!(near.in_bounds().unwrap() > 0.0);
    assert!(map.grid().cost_data().iter().all(|&c| c >= 0.0));
    assert_eq!(map.cost_at(&Position::new(8.0, 0.0, 0.1)).or_sentinel(), -1.0);
}

#[test]
fn test_pose_fused_scans_follow_vehicle() {
    let config = MapConfig {
        origin: [-5.0, -5.0, -0.5],
        size: [10.0, 10.0, 2.0],
        resolution: 0.2,
        window_size: 2,
        ..MapConfig::default()
    };
    let mut map = OccupyMap::new(config, 1, 1).unwrap();
    // An obstacle one meter ahead of the vehicle
    let scan = vec![Position::new(1.0, 0.0, 0.1)];

    let start = Odometry::planar(0.0, 0.0, 0.0, 0.0);
    assert!(map.ingest_local(&scan, &start).is_merged());
    assert_eq!(map.ingest_local(&scan, &start), MergeOutcome::Gated);

    let turned = Odometry::planar(0.0, 2.0, 0.0, std::f64::consts::FRAC_PI_2);
    assert!(map.ingest_local(&scan, &turned).is_merged());

    // Seen at (1, 0) from the start and at (0, 3) after turning left
    let mut raw = map.raw_cloud().to_vec();
    raw.sort_by(|a, b| a.y.total_cmp(&b.y));
    assert_eq!(raw.len(), 2);
    assert!((raw[0] - Position::new(1.0, 0.0, 0.1)).norm() < 1e-9);
    assert!((raw[1] - Position::new(0.0, 3.0, 0.1)).norm() < 1e-9);

    let ring = map.stencils().obstacle.len();
    assert_eq!(map.inflated_cloud().len(), 2 * ring);
}

#[test]
fn test_invalid_returns_do_not_hide_obstacles() {
    let obstacle = Position::new(0.02, 0.02, 0.02);

    let mut clean = OccupyMap::new(MapConfig::default(), 1, 1).unwrap();
    clean.ingest_world(vec![obstacle]);

    let mut noisy = OccupyMap::new(MapConfig::default(), 1, 1).unwrap();
    noisy.ingest_world(vec![
        obstacle,
        Position::new(f64::NAN, 0.0, 0.0),
        Position::new(0.0, f64::INFINITY, 0.0),
    ]);

    assert_eq!(clean.grid().occupied_count(), 16);
    assert_eq!(noisy.grid().occupied_count(), 16);
    assert_eq!(noisy.raw_cloud(), clean.raw_cloud());
    assert!(noisy.raw_cloud().iter().all(|p| p.iter().all(|c| c.is_finite())));
}
