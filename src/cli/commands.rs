use crate::bundler::Interlock;
use crate::core::models::{BuildEvent, Compilation, EmittedArtifact};
use crate::core::pluggable::Pluggable;
use crate::core::services::{
    BuildOutput, Compile, ConstructBundle, EmitRawBundles, GenerateBundles, GenerateModuleMaps,
    GetModuleSeeds, GetUrls, InterpolateFilename, SaveBundles,
};
use crate::utils::{CliOverrides, ConfigLoader, InterlockError, Logger, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "interlock")]
#[command(version)]
#[command(about = "Interlock - a pluggable CommonJS module bundler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every bundle once
    Build(BuildArgs),
    /// Build, then rebuild whenever a source file changes
    Watch(BuildArgs),
    /// Show bundler information
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Project directory; the config file and relative paths resolve against it
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
    /// Config file, `interlock.config.json` by default
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override `srcRoot`
    #[arg(long)]
    pub src_root: Option<PathBuf>,
    /// Override `destRoot`
    #[arg(short, long)]
    pub dest_root: Option<PathBuf>,
    /// Emit a source map next to every bundle
    #[arg(long)]
    pub source_maps: bool,
    /// Minified output
    #[arg(long)]
    pub compact: bool,
    /// Keep comments from module sources
    #[arg(long)]
    pub include_comments: bool,
}

impl BuildArgs {
    /// Flags that were not given leave the config file's value alone.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            src_root: self.src_root.clone(),
            dest_root: self.dest_root.clone(),
            source_maps: self.source_maps.then_some(true),
            compact: self.compact.then_some(true),
            include_comments: self.include_comments.then_some(true),
        }
    }

    fn bundler(&self) -> Result<Interlock> {
        let root = absolute(&self.root)?;
        let opts = ConfigLoader::load(&root, self.config.as_deref(), &self.overrides())?;
        Interlock::new(opts)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        Logger::init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Build(args) => self.handle_build_command(&args).await,
            Commands::Watch(args) => self.handle_watch_command(&args).await,
            Commands::Info => self.handle_info_command(),
        }
    }

    async fn handle_build_command(&self, args: &BuildArgs) -> Result<()> {
        let bundler = args.bundler()?;
        let compilation = bundler.build().await?;
        print_artifacts(&compilation);
        Ok(())
    }

    async fn handle_watch_command(&self, args: &BuildArgs) -> Result<()> {
        let mut bundler = args.bundler()?;

        bundler.observe(print_event);
        bundler.watch(true)?;
        Logger::info("Press Ctrl+C to stop watching");

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| InterlockError::Watch(format!("Failed to listen for Ctrl+C: {}", e)))?;
        bundler.watch(false)?;
        Ok(())
    }

    fn handle_info_command(&self) -> Result<()> {
        tracing::info!("🔗 Interlock v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("══════════════════════════════════════");
        tracing::info!("");
        tracing::info!("🧩 Extension points:");
        for line in [
            describe::<Compile>("promise"),
            describe::<GetModuleSeeds>("promise"),
            describe::<GenerateModuleMaps>("promise"),
            describe::<GenerateBundles>("promise"),
            describe::<InterpolateFilename>("stream"),
            describe::<GetUrls>("stream"),
            describe::<EmitRawBundles>("promise"),
            describe::<ConstructBundle>("promise"),
            describe::<BuildOutput>("promise"),
            describe::<SaveBundles>("promise"),
        ] {
            tracing::info!("  • {}", line);
        }
        tracing::info!("");
        tracing::info!("🔌 Built-in plugins: banner, stats");
        Ok(())
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn describe<P: Pluggable>(strategy: &str) -> String {
    if P::DEPENDENCIES.is_empty() {
        format!("{:?} ({})", P::POINT, strategy)
    } else {
        format!("{:?} ({}) -> {:?}", P::POINT, strategy, P::DEPENDENCIES)
    }
}

fn print_artifacts(compilation: &Compilation) {
    let dest_root = &compilation.opts.dest_root;
    for (dest, artifact) in &compilation.bundles {
        let kind = match artifact {
            EmittedArtifact::Bundle { bundle, .. } if bundle.is_entry => "entry".green(),
            EmittedArtifact::Bundle { .. } => "split".yellow(),
            EmittedArtifact::SourceMap { .. } => "map".dimmed(),
        };
        println!(
            "  {} {} {}",
            kind,
            dest_root.join(dest).display().to_string().cyan(),
            format!("({} bytes)", artifact.raw().len()).dimmed()
        );
    }
}

fn print_event(event: &BuildEvent) {
    if let Some(modules) = &event.patch_modules {
        for module in modules {
            println!("  {} {}", "changed".yellow(), module.ns_path);
        }
    }
    if let Some(compilation) = &event.compilation {
        print_artifacts(compilation);
    }
    if let Some(error) = &event.error {
        eprintln!("{}", error.format_detailed().red());
    }
}
