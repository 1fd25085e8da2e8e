use occupy_map::{AgentPose, Lookup, MapConfig, OccupyMap, PointCloud, Position};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A 6 m x 6 m map at 0.2 m resolution, centered on the origin
    let config = MapConfig {
        origin: [-3.0, -3.0, -0.5],
        size: [6.0, 6.0, 1.0],
        resolution: 0.2,
        obstacle_inflation: 0.2,
        self_inflation: 0.2,
        cost_margin_cells: 2,
        show_border: true,
        ..MapConfig::default()
    };
    let mut map = OccupyMap::new(config, 1, 2)?;

    // A second vehicle parked in the lower-left corner
    map.update_peer(2, AgentPose::new(Position::new(-1.8, -1.8, 0.1), true));

    // An L-shaped wall
    let mut scan = PointCloud::new();
    for i in 0..15 {
        scan.push(Position::new(1.0, -1.5 + i as f64 * 0.2, 0.1));
    }
    for i in 0..10 {
        scan.push(Position::new(1.0 - i as f64 * 0.2, 1.3, 0.1));
    }
    let outcome = map.ingest_global(scan);
    println!("Global scan: {:?}", outcome);

    let dims = *map.grid().dims();
    let layer = map.position_to_index(&Position::new(0.0, 0.0, 0.1)).z;
    println!("\nOccupancy at z index {} (# = occupied, . = free):", layer);
    for y in (0..dims.y as i64).rev() {
        print!("{:2} ", y);
        for x in 0..dims.x as i64 {
            let idx = occupy_map::VoxelIndex::new(x, y, layer);
            if map.occupancy(&idx).is_occupied() {
                print!("# ");
            } else {
                print!(". ");
            }
        }
        println!();
    }
    print!("   ");
    for x in 0..dims.x {
        print!("{} ", x % 10);
    }
    println!();

    for (label, pos) in [
        ("wall", Position::new(1.2, 0.0, 0.1)),
        ("cost ring", Position::new(1.0 - 0.2 * 3.0, 0.0, 0.1)),
        ("open floor", Position::new(-1.0, 0.5, 0.1)),
        ("outside", Position::new(4.0, 0.0, 0.1)),
    ] {
        let cost = match map.cost_at(&pos) {
            Lookup::InBounds(c) => format!("{:.3}", c),
            Lookup::OutOfBounds => "out of bounds".to_string(),
        };
        println!(
            "{:>10}: occupancy {:2}, cost {}, safe(0.4 m) {}",
            label,
            map.occupancy_at(&pos).as_i8(),
            cost,
            map.check_safety(&pos, 0.4)
        );
    }

    println!(
        "\nRaw cloud: {} points, inflated cloud: {} points (border included)",
        map.raw_cloud().len(),
        map.inflated_cloud().len()
    );

    Ok(())
}
