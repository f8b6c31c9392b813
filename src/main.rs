use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, info, warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use exposure_map::config::Setting;
use exposure_map::exposure::ScheduleMode;
use exposure_map::state::{Clock, State};

#[derive(Parser, Debug)]
#[command(name = "exposure-map", version, about = "即時網格曝光圖模擬")]
struct Args {
    /// 設定檔路徑，不存在時使用預設值
    #[arg(short, long, default_value = "exposure.toml")]
    config: PathBuf,

    #[arg(long, default_value = "log4rs.yml")]
    log_config: PathBuf,

    /// 覆寫排程模式
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<ScheduleMode>,

    /// 覆寫網格邊長
    #[arg(short, long)]
    dimension: Option<i32>,

    /// 執行指定 tick 數後結束（0 表示不限）
    #[arg(short, long)]
    ticks: Option<u64>,

    /// 從 stdin 讀取即時調整指令
    #[arg(short, long)]
    interactive: bool,
}

fn parse_mode(s: &str) -> std::result::Result<ScheduleMode, String> {
    s.parse()
}

/// 即時調整指令
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Mode(ScheduleMode),
    Dimension(i32),
    Percentage(i32),
    DrawRays(bool),
    DrawExposure(bool),
    Status,
    Quit,
}

fn parse_switch(s: Option<&str>) -> Option<bool> {
    match s? {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut words = line.split_whitespace();
    let head = words.next().ok_or_else(|| "empty command".to_string())?;
    let arg = words.next();
    let number = |arg: Option<&str>| -> std::result::Result<i32, String> {
        arg.ok_or_else(|| format!("'{}' needs a number", head))?
            .parse::<i32>()
            .map_err(|e| e.to_string())
    };
    match head {
        "mode" => Ok(Command::Mode(arg.ok_or_else(|| "mode needs a name".to_string())?.parse()?)),
        "dim" | "dimension" => Ok(Command::Dimension(number(arg)?)),
        "pct" | "percentage" => Ok(Command::Percentage(number(arg)?)),
        "rays" => parse_switch(arg).map(Command::DrawRays).ok_or_else(|| "rays on|off".to_string()),
        "exposure" => parse_switch(arg).map(Command::DrawExposure).ok_or_else(|| "exposure on|off".to_string()),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

/// 套用指令，回傳 `false` 代表要結束
fn handle_command(state: &mut State, command: Command) -> bool {
    let mut setting = state.setting().clone();
    match command {
        Command::Mode(mode) => setting.mode = mode,
        Command::Dimension(d) => setting.grid_dimension = d,
        Command::Percentage(p) => setting.time_slice_percentage = p,
        Command::DrawRays(on) => setting.draw_rays = on,
        Command::DrawExposure(on) => setting.draw_exposure = on,
        Command::Status => {
            log_status(state);
            return true;
        }
        Command::Quit => return false,
    }
    if let Err(e) = state.set_setting(setting) {
        warn!("設定被拒絕: {}", e);
    }
    true
}

fn log_status(state: &State) {
    let engine = state.engine();
    let exposed = engine.exposure_map().iter().filter(|e| **e).count();
    let character = state.character();
    info!(
        "tick {} | {:?} {}x{} | exposed {}/{} | passes {} failed {} | character ({:.1}, {:.1}) -> ({:.1}, {:.1}) retargets {}",
        state.ticks(),
        engine.mode(),
        engine.grid().dimension(),
        engine.grid().dimension(),
        exposed,
        engine.grid().num_cells(),
        state.passes(),
        state.failed_ticks(),
        character.position.x,
        character.position.z,
        character.destination.x,
        character.destination.z,
        state.retargets()
    );
}

fn init_logging(path: &Path) -> Result<()> {
    if path.exists() {
        log4rs::init_file(path, Default::default())
            .with_context(|| format!("failed to load log config {}", path.display()))?;
        return Ok(());
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {h({l})} {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn load_setting(args: &Args) -> Result<Setting> {
    let mut setting = if args.config.exists() {
        Setting::from_file(&args.config)
            .with_context(|| format!("failed to load {}", args.config.display()))?
    } else {
        warn!("找不到設定檔 {}，使用預設值", args.config.display());
        Setting::default()
    };
    if let Some(mode) = args.mode {
        setting.exposure.mode = mode;
    }
    if let Some(dimension) = args.dimension {
        setting.exposure.grid_dimension = dimension;
    }
    if let Some(ticks) = args.ticks {
        setting.simulation.max_ticks = ticks;
    }
    setting.exposure = setting.exposure.validated()?;
    Ok(setting)
}

fn spawn_stdin_reader(tx: Sender<Command>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
        debug!("stdin reader finished");
    });
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_config)?;

    let setting = load_setting(&args)?;
    info!(
        "啟動曝光模擬: {}x{} grid, mode {:?}, {} tps",
        setting.exposure.grid_dimension,
        setting.exposure.grid_dimension,
        setting.exposure.mode,
        setting.simulation.tps
    );

    let mut state = State::new(&setting)?;
    let tps = setting.simulation.tps.max(1);
    let max_ticks = setting.simulation.max_ticks;
    let mut clock = Clock::new(Duration::from_secs_f64(1.0 / tps as f64));

    let (tx, rx) = unbounded();
    if args.interactive {
        spawn_stdin_reader(tx);
    } else {
        drop(tx);
    }

    loop {
        let mut quit = false;
        for command in rx.try_iter() {
            if !handle_command(&mut state, command) {
                quit = true;
            }
        }
        if quit {
            break;
        }

        state.tick(clock.dt()).context("simulation tick failed")?;

        if state.ticks() % tps == 0 {
            log_status(&state);
        }
        if max_ticks > 0 && state.ticks() >= max_ticks {
            break;
        }

        // Wait for the next tick.
        clock.tick();
    }

    log_status(&state);
    info!("模擬結束，共 {} ticks", state.ticks());
    Ok(())
}
