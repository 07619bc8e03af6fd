//! wurf CLI - Source dependency resolution for waf based builds

use anyhow::Result;
use clap::{Parser, Subcommand};

mod graph;
mod logging;
mod passive;
mod path_cmd;
mod resolve;
mod settings;

use logging::{LogFormat, LogLevel};
use settings::ConfigArgs;

#[derive(Parser)]
#[command(name = "wurf")]
#[command(version)]
#[command(about = "Resolve source dependencies for a build", long_about = None)]
struct Cli {
    /// Minimum level of log messages (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn, env = "WURF_LOG_LEVEL")]
    log_level: LogLevel,

    /// Format of log messages
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all dependencies and record the results
    Resolve(resolve::ResolveArgs),

    /// Visit resolved dependencies in declaration order
    Configure {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Visit resolved dependencies in reverse declaration order
    Build {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the resolved path of a dependency
    Path {
        /// Dependency name
        name: String,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Resolve(args) => {
            let resolved = resolve::resolve_dependencies(&args)?;
            resolve::print_summary(&resolved);
        }

        Commands::Configure { config } => {
            for path in passive::configure(&config)? {
                println!("Configure {}", path.display());
            }
        }

        Commands::Build { config } => {
            for path in passive::build(&config)? {
                println!("Build {}", path.display());
            }
        }

        Commands::Path { name, config } => {
            println!("{}", path_cmd::dependency_path(&config, &name)?.display());
        }
    }

    Ok(())
}
