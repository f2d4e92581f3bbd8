use std::io::Read;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use layerstack::config::Settings;
use layerstack::construct::Value;
use layerstack::persist::Persistor;
use layerstack::persisted::PersistedLayers;
use layerstack::script::Engine;
use layerstack::stack::LayerStack;
use layerstack::{LayersError, Result};

const USAGE: &str = "usage: layerstack [--config <file>] [script ...]

Runs each layer script (stdin when none are given) against the stored
layers and prints the resolved values as JSON.";

fn main() -> ExitCode {
    let mut config_path: Option<String> = None;
    let mut scripts = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("{}", USAGE);
                    return ExitCode::FAILURE;
                }
            },
            "-h" | "--help" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            _ => scripts.push(arg),
        }
    }

    let settings = match Settings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&settings, &scripts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "layerstack failed");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings, scripts: &[String]) -> Result<()> {
    let stack = LayerStack::with_policy(Vec::<(String, Value)>::new(), settings.reseed);
    let store = Persistor::new(settings.persistence_mode())?;
    let mut layers = PersistedLayers::open(Box::new(store), stack, Engine::default())?;

    if scripts.is_empty() {
        let mut script = String::new();
        std::io::stdin().read_to_string(&mut script)?;
        let executed = layers.execute(&script)?;
        info!(executed, "ran script from stdin");
    }
    for path in scripts {
        let script = std::fs::read_to_string(path)?;
        let executed = layers.execute(&script)?;
        info!(%path, executed, "ran script");
    }

    let resolved: serde_json::Map<String, serde_json::Value> = layers
        .resolve_all()?
        .into_iter()
        .map(|(key, datum)| (key, datum.to_json()))
        .collect();
    let json = serde_json::to_string_pretty(&serde_json::Value::Object(resolved))
        .map_err(|e| LayersError::Execution(e.to_string()))?;
    println!("{}", json);

    let pending = layers.stack().diff();
    if !pending.is_empty() {
        info!(slot = layers.current().slot(), "uncommitted changes:\n{}", pending);
    }
    Ok(())
}
