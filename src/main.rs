//! Tile Bounce - native demo
//!
//! Drops one disc and throws another through a small level, logging every
//! frame (`RUST_LOG=debug` or `trace` for more detail).
//!
//! Usage: `tile-bounce [settings.json]`

use std::collections::BTreeSet;
use std::process::ExitCode;

use glam::{DVec2, IVec2};
use tile_bounce::Settings;
use tile_bounce::sim::{BodyController, TileMap};

const LEVEL: &[&str] = &[
    "################",
    "#..............#",
    "#..............#",
    "#.....##.......#",
    "#..............#",
    "#..........7...#",
    "#..............#",
    "#.\\.........../#",
    "#..\\........./##",
    "################",
];

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Tile Bounce (native) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => match Settings::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load settings from {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    if let Err(e) = settings.validate() {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }

    let map = TileMap::from_rows(LEVEL);
    for row in map.to_rows() {
        println!("{row}");
    }

    let mut body = BodyController::new(&settings);

    println!("\nDrop:");
    body.place(DVec2::new(120.0, 48.0));
    body.release(DVec2::ZERO);
    run(&map, &mut body);

    println!("\nThrow:");
    body.place(DVec2::new(400.0, 80.0));
    for i in 1..=6 {
        body.record_held(DVec2::new(400.0 - 3.0 * i as f64, 80.0 - 1.5 * i as f64));
    }
    body.throw();
    run(&map, &mut body);

    ExitCode::SUCCESS
}

fn run(map: &TileMap, body: &mut BodyController) {
    let world = map.bounded();
    let mut struck = BTreeSet::new();
    while !body.is_halted() {
        let step = body.step(&world);
        if let Some(tile) = step.hit {
            struck.insert((tile.x, tile.y));
        }
        log::debug!(
            "frame {:4}: center=({:8.3}, {:8.3}) vel=({:7.3}, {:7.3}) hit={:?}",
            body.steps(),
            step.center.x,
            step.center.y,
            step.vel.x,
            step.vel.y,
            step.hit
        );
    }

    let center = body.center();
    println!(
        "  rest at ({:.2}, {:.2}) after {} steps ({:?})",
        center.x,
        center.y,
        body.steps(),
        body.halt_reason()
    );
    let tiles: Vec<String> = struck
        .into_iter()
        .map(|(x, y)| IVec2::new(x, y).to_string())
        .collect();
    println!("  struck tiles: {}", if tiles.is_empty() { "none".into() } else { tiles.join(" ") });
}
