//! Headless demo: enemies chase a moving player across a platform level

use std::time::{Duration, Instant};

use pathgrid::prelude::*;

const GROUND: CategoryMask = CategoryMask::bit(0);
const FRAME_TIME: f32 = 1.0 / 60.0;
const ENEMY_SPEED: f32 = 4.0;

/// One pathfinding agent
struct Enemy {
    name: &'static str,
    position: Vec3,
    follower: PathFollower,
}

/// Build the level geometry
fn build_level() -> CollisionWorld {
    let mut world = CollisionWorld::new();

    // Floor, two ledges and a pillar splitting the room
    world.add_platform(0.0, -22.0, 50.0, 3.0, GROUND);
    world.add_platform(-12.0, -8.0, 14.0, 1.0, GROUND);
    world.add_platform(12.0, 4.0, 14.0, 1.0, GROUND);
    world.add_box(Vec3::new(0.0, -10.0, 0.0), Vec3::new(1.0, 8.0, 1.0), 0.0, GROUND);
    world.add_ball(Vec3::new(-5.0, 10.0, 0.0), 3.0, GROUND);

    world.update_queries();
    world
}

/// Player walks back and forth along the upper half of the level
fn player_position(time: f32) -> Vec3 {
    Vec3::new(18.0 * (time * 0.3).sin(), 12.0, 0.0)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading pathfinding config from {path}");
            PathfindingConfig::load(path)?
        }
        None => PathfindingConfig::default().with_unwalkable_mask(GROUND),
    };

    let level = build_level();
    let started = Instant::now();
    let mut session = NavigationSession::new(config, &level)?;
    log::info!("Grid built in {:?}", started.elapsed());

    let mut enemies = vec![
        Enemy {
            name: "grunt",
            position: Vec3::new(-20.0, -18.0, 0.0),
            follower: session.follower(),
        },
        Enemy {
            name: "scout",
            position: Vec3::new(20.0, -18.0, 0.0),
            follower: session.follower(),
        },
        Enemy {
            name: "brute",
            position: Vec3::new(-15.0, 0.0, 0.0),
            follower: session.follower(),
        },
    ];

    let mut time = 0.0;
    for frame in 0..600 {
        time += FRAME_TIME;
        let player = player_position(time);

        session.update();
        for enemy in &mut enemies {
            let direction = enemy.follower.update(
                FRAME_TIME,
                enemy.position,
                player,
                session.service_mut(),
            );
            enemy.position += direction * ENEMY_SPEED * FRAME_TIME;
        }

        if frame % 60 == 0 {
            for enemy in &enemies {
                log::info!(
                    "[{:>4}] {} at ({:.1}, {:.1}), {} waypoints left, player at ({:.1}, {:.1})",
                    frame,
                    enemy.name,
                    enemy.position.x,
                    enemy.position.y,
                    enemy.follower.remaining_waypoints().len(),
                    player.x,
                    player.y
                );
            }
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    log::info!(
        "Served {} path requests",
        session.service().completed()
    );
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Pathfinding demo error: {e}");
    }
}
