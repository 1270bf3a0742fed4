use anyhow::Result;
use clap::{Parser, Subcommand};
use pipewrench_pm::{Builder, ProjectConfig, TstlCompiler};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pipewrench")]
#[command(version)]
#[command(about = "TypeScriptToLua build tool for Project Zomboid mods", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new mod (mod.info, pipewrench.json, tsconfig.json, src/)
    Init {
        /// Project path (default: current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Rebuild whenever src/ changes
    Watch {
        /// Project path (default: current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Quiet period before a batch of changes is handled, in milliseconds
        #[arg(
            long,
            value_name = "MS",
            default_value_t = pipewrench_pm::DEFAULT_DEBOUNCE.as_millis() as u64
        )]
        debounce: u64,
    },

    /// Compile the mod once
    Build {
        /// Project path (default: current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Export the mod's type declarations as <out_dir>/<mod_id>.d.ts
    BuildDeclarations {
        /// Project path (default: current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            pipewrench_pm::init_project(path)?;
            Ok(())
        }

        Commands::Watch { path, debounce } => {
            let builder = Builder::for_project(&path)?;
            pipewrench_pm::watch(&builder, std::time::Duration::from_millis(debounce))
        }

        Commands::Build { path } => {
            Builder::for_project(&path)?.build()?;
            Ok(())
        }

        Commands::BuildDeclarations { path } => {
            let project = ProjectConfig::load(&path)?;
            let compiler = TstlCompiler::new(project.settings.compiler.clone());
            if let Some(file) = pipewrench_pm::build_declarations(&project, &compiler)? {
                log::info!("wrote {}", file.display());
            }
            Ok(())
        }
    }
}
