use std::env;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::debug;
use thiserror::Error;

use pit_core::config::{ConfigError, PitConfig};
use pit_core::find::find_projects;
use pit_core::registry::{PitFields, Registry, RegistryError};
use pit_core::relay::{self, Relay, RelayError};
use pit_core::views;

#[derive(Parser)]
#[command(
    name = "pit",
    version = pit_core::version(),
    about = "Project Index in Terminal. Organize your projects with ease."
)]
struct Cli {
    /// Prompt on ambiguous operations
    #[arg(short, long, global = true, conflicts_with = "noninteractive")]
    interactive: bool,
    /// Never prompt
    #[arg(long, global = true)]
    noninteractive: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a project (default: the current directory)
    Init { path: Option<PathBuf> },
    /// Find projects on a path and enumerate them
    Find { path: Option<PathBuf> },
    /// List active projects
    Index {
        /// List all (also inactive) projects
        #[arg(short, long)]
        all: bool,
    },
    /// Update the project's index entry
    Update {
        /// Index or name of the project
        pid: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New path
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Toggle status
        #[arg(short, long)]
        status: bool,
    },
    /// Change CWD to the project directory, by name or index
    Goto { pid: String },
    /// Drop a project from the index
    Drop { pid: String },
    /// Run the project's start script if it exists
    Start,
    /// Run the project's stop script if it exists
    Stop,
    /// Add a pit resource to the current project
    Add {
        /// One of the configured groups
        #[arg(short, long)]
        group: Option<String>,
        /// Unique name of the pit resource
        #[arg(short, long)]
        name: Option<String>,
        /// Description of the pit resource
        #[arg(short, long)]
        description: Option<String>,
        /// Location (e.g. URL, path, email) which can be opened
        #[arg(short, long)]
        location: Option<String>,
    },
    /// List the current project's pits
    List {
        /// Groups to include (default: all)
        groups: Vec<String>,
    },
    /// Open a pit according to its group
    Open { id: String },
    /// Edit a pit's group, name, description or location
    Edit {
        /// Index or name of the pit
        id: String,
        #[arg(short, long)]
        group: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Delete a pit resource from the current project
    Delete { id: String },
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Auto,
    Interactive,
    NonInteractive,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            CliError::Registry(err) => err.code(),
            CliError::Relay(_) | CliError::Config(_) | CliError::Io(_) => "IOError",
            CliError::Other(_) => "Error",
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{}: {}", err.code(), err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mode = if cli.interactive {
        Mode::Interactive
    } else if cli.noninteractive {
        Mode::NonInteractive
    } else {
        Mode::Auto
    };
    debug!("interaction mode: {mode:?}");

    let config = PitConfig::load()?;
    let registry = Registry::new(&config);
    let relay = Relay::new(config.relay_path());

    match cli.command {
        Command::Init { path } => {
            let target = target_or_cwd(path)?;
            let project = registry.init_project(&target)?;
            println!("Initialized project {} at {}", project.id, project.path);
        }
        Command::Find { path } => {
            let root = target_or_cwd(path)?;
            for (n, found) in find_projects(&root, &config.snitches).enumerate() {
                println!("{:>3}  {}", n + 1, found.display());
            }
        }
        Command::Index { all } => {
            let projects = registry.list_projects(all)?;
            if projects.is_empty() {
                println!("No projects indexed yet. Run `pit init` inside one.");
            }
            for project in projects {
                println!("{}", views::render_project_line(&project));
            }
        }
        Command::Update {
            pid,
            name,
            path,
            status,
        } => {
            let project =
                registry.update_project(&pid, name.as_deref(), path.as_deref(), status)?;
            println!("Updated project {}", project.id);
        }
        Command::Goto { pid } => {
            let project = registry.project(&pid)?;
            relay.emit(&relay::goto_command(Path::new(&project.path)))?;
        }
        Command::Drop { pid } => {
            let dropped = registry.drop_project(&pid)?;
            println!("Dropped project {} ({})", dropped.id, dropped.path);
        }
        Command::Start => run_script(&registry, &relay, relay::START_SCRIPT)?,
        Command::Stop => run_script(&registry, &relay, relay::STOP_SCRIPT)?,
        Command::Add {
            group,
            name,
            description,
            location,
        } => {
            let pit = registry.add_pit(
                None,
                PitFields {
                    group,
                    name,
                    description,
                    location,
                },
            )?;
            println!("Added pit {}", pit.id);
        }
        Command::List { groups } => {
            for pit in registry.list_pits(None, &groups)? {
                println!("{}", views::render_pit_line(&pit));
            }
        }
        Command::Open { id } => {
            let pit = registry.pit(None, &id)?;
            let Some(location) = pit.location.as_deref() else {
                return Err(anyhow::anyhow!("Pit {} has no location to open", pit.id).into());
            };
            relay.emit(&relay::open_command(pit.group.as_deref(), location))?;
        }
        Command::Edit {
            id,
            group,
            name,
            description,
            location,
        } => {
            let pit = registry.edit_pit(
                None,
                &id,
                PitFields {
                    group,
                    name,
                    description,
                    location,
                },
            )?;
            println!("Updated pit {}", pit.id);
        }
        Command::Delete { id } => {
            let deleted = registry.delete_pit(None, &id)?;
            println!("Deleted pit {}", deleted.id);
        }
    }
    Ok(())
}

fn run_script(registry: &Registry, relay: &Relay, script: &str) -> Result<(), CliError> {
    let project = registry.current_project()?;
    match relay::script_command(Path::new(&project.path), script) {
        Some(command) => relay.emit(&command)?,
        None => debug!("project {} has no {script}", project.id),
    }
    Ok(())
}

fn target_or_cwd(path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match path {
        Some(path) => Ok(path),
        None => Ok(env::current_dir()?),
    }
}
