use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use movement_core::{
    ChatCompletionsClient, EmbeddingOracle, EmbeddingsClient, MovementOrchestrator,
    PromptSettings, SpatialStore, WandererConfig, WorldStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use world_rules::{Embedding, NodeLabel, Position, Scene, UserId, EMBEDDING_DIM};

#[derive(Debug, Default)]
struct CommonOptions {
    config: Option<PathBuf>,
    world: Option<PathBuf>,
}

#[derive(Debug)]
enum CommandKind {
    Seed {
        description: String,
        position: Position,
    },
    Where {
        user: UserId,
    },
    Move {
        user: UserId,
        command: String,
    },
    Nearby {
        position: Position,
    },
}

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        println!("{}", usage_text());
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                options.config = Some(PathBuf::from(value));
                index += 2;
            }
            "--world" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --world".to_string())?;
                options.world = Some(PathBuf::from(value));
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "seed" => {
            if command_args.len() != 3 {
                return Err("seed requires <description> <r> <theta>".to_string());
            }
            CommandKind::Seed {
                description: command_args[0].clone(),
                position: parse_position(&command_args[1], &command_args[2])?,
            }
        }
        "where" => {
            if command_args.len() != 1 {
                return Err("where requires a user id".to_string());
            }
            CommandKind::Where {
                user: UserId::new(command_args[0].as_str()),
            }
        }
        "move" => {
            if command_args.len() < 2 {
                return Err("move requires <user> <command...>".to_string());
            }
            CommandKind::Move {
                user: UserId::new(command_args[0].as_str()),
                command: command_args[1..].join(" "),
            }
        }
        "nearby" => {
            if command_args.len() != 2 {
                return Err("nearby requires <r> <theta>".to_string());
            }
            CommandKind::Nearby {
                position: parse_position(&command_args[0], &command_args[1])?,
            }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options)
}

fn run(kind: CommandKind, options: CommonOptions) -> Result<(), String> {
    let mut config = match &options.config {
        Some(path) => WandererConfig::load(path).map_err(|err| err.to_string())?,
        None => WandererConfig::default(),
    };
    if let Some(world) = options.world {
        config.store.world_path = world;
    }
    config.validate().map_err(|err| err.to_string())?;

    let store = WorldStore::open(&config.store.world_path).map_err(|err| err.to_string())?;

    match kind {
        CommandKind::Seed {
            description,
            position,
        } => seed_scene(&store, &config, description, position),
        CommandKind::Where { user } => {
            let session = store.session().map_err(|err| err.to_string())?;
            let lookup = session.get_position(&user).map_err(|err| err.to_string())?;
            if lookup.was_provisioned() {
                info!(user_id = %user, "new explorer starts at the origin");
            }
            println!("{} {}", user, lookup.position());
            Ok(())
        }
        CommandKind::Move { user, command } => {
            let language = ChatCompletionsClient::new(&config.oracle).map_err(|err| err.to_string())?;
            let embedder = EmbeddingsClient::new(&config.oracle).map_err(|err| err.to_string())?;
            let orchestrator =
                MovementOrchestrator::new(&store, language, embedder, config.movement.clone())
                    .with_prompt_settings(PromptSettings::from(&config.oracle));
            let result = orchestrator.process_movement(&user, &command);
            print_json(&result)?;
            if result.success {
                Ok(())
            } else {
                Err(result.message)
            }
        }
        CommandKind::Nearby { position } => {
            let session = store.session().map_err(|err| err.to_string())?;
            let nearby = session
                .find_nearby_scenes(position, config.movement.nearby_radius)
                .map_err(|err| err.to_string())?;
            print_json(&nearby)
        }
    }
}

/// Insert a scene and, when the embedding oracle answers, index its description.
fn seed_scene(
    store: &WorldStore,
    config: &WandererConfig,
    description: String,
    position: Position,
) -> Result<(), String> {
    let embedding = EmbeddingsClient::new(&config.oracle)
        .and_then(|client| client.embed(&description))
        .map_err(|err| err.to_string())
        .and_then(|raw| Embedding::new(raw).map_err(|err| err.to_string()));

    let session = store.session().map_err(|err| err.to_string())?;
    session
        .declare_vector_index(NodeLabel::Scene, EMBEDDING_DIM)
        .map_err(|err| err.to_string())?;
    let id = session
        .create_scene(Scene::new(description, position))
        .map_err(|err| err.to_string())?;
    match embedding {
        Ok(embedding) => session
            .store_embedding(&id, embedding, NodeLabel::Scene)
            .map_err(|err| err.to_string())?,
        Err(err) => warn!(error = %err, "scene stored without an embedding"),
    }
    println!("{id}");
    Ok(())
}

fn parse_position(r: &str, theta: &str) -> Result<Position, String> {
    let r = r
        .parse::<f64>()
        .map_err(|_| format!("invalid r value '{r}' (expected a number)"))?;
    let theta = theta
        .parse::<f64>()
        .map_err(|_| format!("invalid theta value '{theta}' (expected a number)"))?;
    if !r.is_finite() || !theta.is_finite() {
        return Err("coordinates must be finite".to_string());
    }
    Ok(Position::new(r, theta))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

fn usage_text() -> String {
    [
        "explorer_cli - move explorers around a polar world",
        "",
        "Usage:",
        "  explorer_cli [--config <file>] [--world <file>] seed <description> <r> <theta>",
        "  explorer_cli [--config <file>] [--world <file>] where <user>",
        "  explorer_cli [--config <file>] [--world <file>] move <user> <command...>",
        "  explorer_cli [--config <file>] [--world <file>] nearby <r> <theta>",
        "",
        "Defaults:",
        "  --world world.json",
        "  RUST_LOG=info",
    ]
    .join("\n")
}
