// Gem finder mission sample
//
// A robot dropped at an unknown spot builds a landmark map with online
// graph SLAM and collects the gem types on its checklist.
//
// Run with RUST_LOG=debug to follow the planner's decisions.

use gem_slam::common::RoboticsResult;
use gem_slam::mission_planning::ExtractionPlanner;
use gem_slam::simulation::{run_mission, GemField, SimulationConfig};

const MAX_DISTANCE: f64 = 1.0;
const MAX_STEERING: f64 = std::f64::consts::FRAC_PI_2 + 0.01;
const MAX_STEPS: usize = 2000;

fn main() -> RoboticsResult<()> {
    env_logger::init();
    println!("gem finder start!!");

    let area = [
        "B.........",
        "....A.....",
        "..........",
        "...@....C.",
        "..........",
        "......D...",
        "L.........",
    ];
    let needed = ['A', 'C', 'D'];

    let config = SimulationConfig {
        seed: 42,
        ..SimulationConfig::new(MAX_DISTANCE, MAX_STEERING)
    };
    let mut field = GemField::from_area_map(&area, &needed, config)?;
    let mut planner = ExtractionPlanner::with_limits(MAX_DISTANCE, MAX_STEERING)?;

    let report = run_mission(&mut field, &mut planner, MAX_STEPS)?;

    println!("steps: {}", report.steps);
    for gem in &report.collected {
        println!("collected {} ({})", gem.kind, gem.id);
    }
    if !report.is_complete() {
        println!("still needed: {:?}", report.remaining);
    }
    println!("failed extractions: {}", report.failed_extractions);

    let truth = field.robot_position();
    let estimate = planner.slam().pose();
    println!(
        "robot true ({:.3}, {:.3}) estimated ({:.3}, {:.3}) error {:.3}",
        truth.x,
        truth.y,
        estimate.x,
        estimate.y,
        truth.distance(&estimate)
    );
    Ok(())
}
