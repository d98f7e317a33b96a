mod catalog;
mod catalog_loader;
mod catalog_store;
mod classifier;
mod config;
mod feed;
mod filter_controller;
mod media_host;
mod protocol;
mod render;
mod sequencer;
mod sources;
mod surface;
mod surface_manager;

use std::io::BufRead;
use std::thread;

use log::{debug, error, info};
use tokio::sync::broadcast;

use catalog_loader::CatalogLoader;
use catalog_store::CatalogStore;
use classifier::FamilyTag;
use config::{sanitize_config, Config, FeedShape};
use filter_controller::FilterController;
use media_host::MediaHost;
use protocol::{CatalogMessage, FilterMessage, Message, PlaybackMessage, SurfaceMessage};
use sequencer::PlaybackSequencer;
use surface_manager::SurfaceManager;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Loads `config.toml`, creating it with defaults on first run.
fn bootstrap_config() -> Result<Config, String> {
    let config_root = dirs::config_dir()
        .ok_or("no config directory available")?
        .join("demotape");
    let config_file = config_root.join("config.toml");

    std::fs::create_dir_all(&config_root).map_err(|err| {
        format!(
            "Failed to create config directory {}: {}",
            config_root.display(),
            err
        )
    })?;

    if !config_file.exists() {
        let default_config = sanitize_config(Config::default());
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        let text = toml::to_string(&default_config)
            .map_err(|err| format!("Failed to serialize default config: {}", err))?;
        std::fs::write(&config_file, text)
            .map_err(|err| format!("Failed to write {}: {}", config_file.display(), err))?;
    }

    let content = std::fs::read_to_string(&config_file)
        .map_err(|err| format!("Failed to read {}: {}", config_file.display(), err))?;
    Ok(sanitize_config(
        toml::from_str::<Config>(&content).unwrap_or_default(),
    ))
}

/// `demotape [tabular|nested] [SOURCE]` overrides the configured feed.
fn apply_cli_overrides(mut config: Config) -> Config {
    let mut args = std::env::args().skip(1);
    if let Some(shape) = args.next() {
        match shape.as_str() {
            "tabular" => config.feed.shape = FeedShape::Tabular,
            "nested" => config.feed.shape = FeedShape::Nested,
            other => {
                error!("Unknown feed shape '{}', keeping configured one", other);
                return config;
            }
        }
        if let Some(source) = args.next() {
            match config.feed.shape {
                FeedShape::Tabular => config.feed.tabular_source = source,
                FeedShape::Nested => config.feed.nested_source = source,
            }
        }
    }
    config
}

const COMMAND_HELP: &str = "commands:
  reload                      fetch the feed again
  year <family> [value]       set or clear the year filter
  platform <family> [value]   set or clear the platform filter
  search <family> [text]      set or clear the search text
  facets <family>             list the filter menu options
  play <family>               play the group's native units in order
  finish <family>             signal natural completion of the playing unit
  fail <family> [reason]      signal failure of the playing unit
  open <family> <index>       open a rendered unit's media externally
  show                        reprint the visible surface
  report                      bibliography diagnostics
  quit";

fn parse_family(token: Option<&str>) -> Option<FamilyTag> {
    match token.and_then(FamilyTag::from_key) {
        Some(family) => Some(family),
        None => {
            println!("expected a family: ar, gan, diffusion");
            None
        }
    }
}

fn handle_command(line: &str, bus_sender: &broadcast::Sender<Message>, store: &CatalogStore) -> bool {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return true;
    };
    let rest: Vec<&str> = tokens.collect();

    match command {
        "quit" | "exit" => return false,
        "help" => println!("{}", COMMAND_HELP),
        "reload" => {
            let _ = bus_sender.send(Message::Catalog(CatalogMessage::Reload));
        }
        "year" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let _ = bus_sender.send(Message::Filter(FilterMessage::SetYear {
                    family,
                    value: rest.get(1).map(|value| value.to_string()),
                }));
            }
        }
        "platform" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let _ = bus_sender.send(Message::Filter(FilterMessage::SetPlatform {
                    family,
                    value: rest.get(1).map(|value| value.to_string()),
                }));
            }
        }
        "search" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let _ = bus_sender.send(Message::Filter(FilterMessage::SetSearch {
                    family,
                    text: rest[1..].join(" "),
                }));
            }
        }
        "facets" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                match store.snapshot().group(family) {
                    Some(group) => {
                        println!("years: {}", group.facets.years.join(", "));
                        println!("platforms: {}", group.facets.platforms.join(", "));
                    }
                    None => println!("no loaded group for {}", family.key()),
                }
            }
        }
        "play" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let _ = bus_sender.send(Message::Playback(PlaybackMessage::PlayAll { family }));
            }
        }
        "finish" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let _ =
                    bus_sender.send(Message::Playback(PlaybackMessage::ElementCompleted { family }));
            }
        }
        "fail" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                let reason = if rest.len() > 1 {
                    rest[1..].join(" ")
                } else {
                    "playback error".to_string()
                };
                let _ = bus_sender
                    .send(Message::Playback(PlaybackMessage::ElementFailed { family, reason }));
            }
        }
        "open" => {
            if let Some(family) = parse_family(rest.first().copied()) {
                match rest.get(1).and_then(|token| token.parse::<usize>().ok()) {
                    Some(index) => {
                        let _ = bus_sender
                            .send(Message::Surface(SurfaceMessage::OpenUnitLink { family, index }));
                    }
                    None => println!("expected a unit index"),
                }
            }
        }
        "show" => {
            let _ = bus_sender.send(Message::Surface(SurfaceMessage::SnapshotRequested));
        }
        "report" => {
            let _ = bus_sender.send(Message::Catalog(CatalogMessage::DiagnosticsRequested));
        }
        other => println!("unknown command '{}', try 'help'", other),
    }
    true
}

fn run() -> Result<(), String> {
    let config = apply_cli_overrides(bootstrap_config()?);
    info!(
        "Starting with {:?} feed ({})",
        config.feed.shape,
        match config.feed.shape {
            FeedShape::Tabular => &config.feed.tabular_source,
            FeedShape::Nested => &config.feed.nested_source,
        }
    );

    let (bus_sender, _) = broadcast::channel::<Message>(4096);
    let store = CatalogStore::new();

    // Catalog loader
    let loader_receiver = bus_sender.subscribe();
    let loader_sender = bus_sender.clone();
    let loader_store = store.clone();
    let loader_config = config.clone();
    thread::spawn(move || {
        let mut loader =
            CatalogLoader::new(loader_receiver, loader_sender, loader_store, loader_config);
        loader.run();
    });

    // Filter controller
    let controller_receiver = bus_sender.subscribe();
    let controller_sender = bus_sender.clone();
    let controller_store = store.clone();
    thread::spawn(move || {
        let mut controller =
            FilterController::new(controller_receiver, controller_sender, controller_store);
        controller.run();
    });

    // Media element host
    let host_receiver = bus_sender.subscribe();
    let host_sender = bus_sender.clone();
    thread::spawn(move || {
        let mut host = MediaHost::new(host_receiver, host_sender);
        host.run();
    });

    // Playback sequencer
    let sequencer_receiver = bus_sender.subscribe();
    let sequencer_sender = bus_sender.clone();
    thread::spawn(move || {
        let mut sequencer = PlaybackSequencer::new(sequencer_receiver, sequencer_sender);
        sequencer.run();
    });

    // Surface writer
    let surface_receiver = bus_sender.subscribe();
    let surface_store = store.clone();
    thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut manager = SurfaceManager::new(surface_receiver, surface_store);
            manager.run();
        }));
        if let Err(payload) = run_result {
            error!(
                "SurfaceManager thread terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
    });

    let _ = bus_sender.send(Message::Catalog(CatalogMessage::Reload));

    println!("{}", COMMAND_HELP);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| format!("Failed to read stdin: {}", err))?;
        if !handle_command(&line, &bus_sender, &store) {
            break;
        }
    }

    debug!("Operator loop ended");
    info!("Application exiting");
    Ok(())
}

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    if let Err(err) = run() {
        error!("{}", err);
        std::process::exit(1);
    }
}
