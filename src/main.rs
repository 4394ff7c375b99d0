/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossterm::event::KeyCode;
use log::LevelFilter;

use config::GameConfig;
use domain::player::Steering;
use sim::event::GameEvent;
use sim::report::{self, HostBridge, ReportAction, ScoreReport};
use sim::save;
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const LOG_FILE: &str = "skyhop.log";

/// Ticks the loading splash stays up unless a key skips it.
const LOADING_TICKS: u32 = 30;

/// Consecutive failed frames before the loop gives up.
const MAX_RENDER_FAILURES: u32 = 30;

fn main() {
    init_logging();

    let mut config = GameConfig::load();
    apply_log_level(&config.log_level);
    for fix in config.validate() {
        log::warn!("config: {fix}");
    }

    let seed = config.seed.unwrap_or_else(time_seed);
    let high_score = save::load_high_score();
    log::info!("high score {high_score}, seed {seed}");

    let mut world = WorldState::new(&config, seed, high_score);
    let mut bridge = report::bridge_for(&config);
    let mut renderer = Renderer::new(&config);

    if let Err(e) = renderer.init() {
        log::error!("terminal init failed: {e}");
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut world, &mut renderer, bridge.as_mut(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("game loop aborted: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Skyhop!");
    println!("Best Score: {}", world.high_score);
}

// ── Logging ──

/// Log to a file in the save directory; the terminal is in raw mode on
/// the alternate screen, so stderr output would corrupt the display.
fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Trace).format_timestamp_millis();
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    let path = save::save_dir().join(LOG_FILE);
    match File::create(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Off);
        }
    }

    if builder.try_init().is_ok() && std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// `RUST_LOG` wins over the config file.
fn apply_log_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() { return; }
    match level.parse::<LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("unknown log_level {level:?}; keeping info"),
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}

// ── Loop ──

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    bridge: &mut dyn HostBridge,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.enable_key_release();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        log::info!("gamepad detected");
    }

    let tick_rate = Duration::from_millis(config.game.tick_rate_ms);
    let mut last_tick = Instant::now();
    let mut render_failures: u32 = 0;

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(world, &kb, &gp, bridge, config) {
            break;
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            last_tick = Instant::now();
            world.anim_tick = world.anim_tick.wrapping_add(1);

            match world.phase {
                Phase::Loading => {
                    if world.anim_tick >= LOADING_TICKS {
                        world.phase = Phase::Menu;
                    }
                }
                Phase::Playing => {
                    let steering = merge_steering(kb.steering(&renderer.viewport()), gp.steering());
                    let events = step::step(world, steering, elapsed.as_secs_f32(), config);
                    handle_events(world, &events, bridge);
                }
                _ => {
                    if world.message_timer > 0 {
                        world.message_timer -= 1;
                        if world.message_timer == 0 { world.message.clear(); }
                    }
                }
            }
        }

        match renderer.render(world, config) {
            Ok(()) => render_failures = 0,
            Err(e) => {
                render_failures += 1;
                log::error!("frame failed ({render_failures}/{MAX_RENDER_FAILURES}): {e}");
                if render_failures >= MAX_RENDER_FAILURES {
                    return Err(Box::new(e));
                }
            }
        }
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Keyboard/mouse first; the gamepad adds to held directions.
fn merge_steering(kb: Steering, pad: Steering) -> Steering {
    if kb.target_x.is_some() {
        return kb;
    }
    Steering::keys(kb.left || pad.left, kb.right || pad.right)
}

fn handle_events(world: &mut WorldState, events: &[GameEvent], bridge: &mut dyn HostBridge) {
    for event in events {
        match event {
            GameEvent::NewHighScore { score } => {
                if let Err(e) = save::save_high_score(*score) {
                    log::error!("{e}");
                    world.set_message("Could not save high score", 90);
                }
            }
            GameEvent::GameOver { score } => {
                send_report(bridge, ReportAction::GameOver, *score, world.high_score);
            }
            GameEvent::Victory { score } => {
                send_report(bridge, ReportAction::Victory, *score, world.high_score);
            }
            GameEvent::PlatformBreaking { platform_id } => {
                log::trace!("platform {platform_id} crumbling");
            }
            GameEvent::PlatformsSpawned { count } => {
                let top = world.platforms.highest().map_or(0.0, |p| p.y);
                log::trace!("spawned {count} platforms, {} live, top y={top:.0}", world.platforms.len());
            }
            _ => {}
        }
    }
}

fn send_report(bridge: &mut dyn HostBridge, action: ReportAction, score: u32, high_score: u32) {
    if let Err(e) = bridge.send_report(&ScoreReport::new(action, score, high_score)) {
        log::warn!("score report not delivered: {e}");
    }
}

// ── Key Constants ──

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::F(1), KeyCode::Char('p'), KeyCode::Char('P')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_SHARE: &[KeyCode] = &[KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_DEBUG: &[KeyCode] = &[KeyCode::F(3)];

/// Fresh layout for a new run, unless the config pins the seed.
fn new_run(world: &mut WorldState, config: &GameConfig) {
    if config.seed.is_none() {
        world.reseed(time_seed());
    }
    world.start_game(config);
}

fn return_to_menu(world: &mut WorldState) {
    world.phase = Phase::Menu;
    world.message.clear();
    world.message_timer = 0;
    world.anim_tick = 0;
}

/// Phase transitions driven by keys. Returns true to quit.
fn handle_meta(
    world: &mut WorldState,
    kb: &InputState,
    gp: &GamepadState,
    bridge: &mut dyn HostBridge,
    config: &GameConfig,
) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed();
    let esc = kb.any_pressed(&[KeyCode::Esc]) || gp.cancel_pressed();

    match world.phase {
        Phase::Loading => {
            if confirm || esc {
                world.phase = Phase::Menu;
            }
        }
        Phase::Menu => {
            if confirm {
                new_run(world, config);
            } else if esc || kb.any_pressed(KEYS_QUIT) {
                return true;
            }
        }
        Phase::Playing | Phase::Paused => {
            if kb.any_pressed(KEYS_PAUSE) || gp.pause_pressed() {
                world.toggle_pause();
                log::debug!("pause toggled: {:?}", world.phase);
            } else if kb.any_pressed(KEYS_RESTART) {
                world.start_game(config);
                world.set_message("Restarted", 40);
            } else if kb.any_pressed(KEYS_DEBUG) {
                let on = world.toggle_debug_overlay();
                log::debug!("debug overlay {}", if on { "on" } else { "off" });
            } else if esc {
                log::info!("run abandoned at score {}", world.score);
                return_to_menu(world);
            }
        }
        Phase::GameOver | Phase::Victory => {
            if confirm || kb.any_pressed(KEYS_RESTART) {
                new_run(world, config);
            } else if kb.any_pressed(KEYS_SHARE) {
                send_report(bridge, ReportAction::Share, world.score, world.high_score);
                world.set_message(&report::share_text(world.score), 150);
            } else if esc {
                return_to_menu(world);
            }
        }
    }
    false
}
