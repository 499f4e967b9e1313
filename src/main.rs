// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use recipe_variants::{
    Recipe, VariantInput, VariantsMiddleware, parse_recipe_file, validate_recipe,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "recipe-variants")]
#[command(author, version, about = "Build, package and test a recipe once per variant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RecipeArgs {
    /// Path to the recipe TOML file
    recipe: PathBuf,

    /// Override the recipe's variants (e.g. "x86 x86_64")
    #[arg(short, long)]
    variants: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the variant views and their folders
    Variants(RecipeArgs),
    /// Copy sources into each variant and build them
    Build(RecipeArgs),
    /// Package every variant
    Package(RecipeArgs),
    /// Test every variant
    Test(RecipeArgs),
    /// Print the merged package identity settings
    PackageId(RecipeArgs),
}

fn load(args: &RecipeArgs) -> Result<VariantsMiddleware> {
    let recipe = parse_recipe_file(&args.recipe)
        .with_context(|| format!("Failed to load recipe {}", args.recipe.display()))?;

    for warning in validate_recipe(&recipe)? {
        warn!("{}", warning);
    }

    let mut middleware = VariantsMiddleware::from_recipe_file(recipe)?;
    if let Some(variants) = &args.variants {
        middleware.set_variants(Some(VariantInput::from(variants.as_str())))?;
    }
    Ok(middleware)
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Variants(args) => {
            let middleware = load(&args)?;
            for view in middleware.iter() {
                println!("{}", view.display_name());
                for kind in recipe_variants::FolderKind::ALL {
                    if let Some(path) = view.folder(kind) {
                        println!("  {:<8} {}", kind.as_str(), path.display());
                    }
                }
            }
            Ok(())
        }
        Commands::Build(args) => {
            let mut middleware = load(&args)?;
            if middleware.build_folder().is_some_and(|p| p.is_dir()) {
                middleware.copy_sources()?;
            }
            middleware.build()?;
            info!("Built {}", middleware.display_name());
            Ok(())
        }
        Commands::Package(args) => {
            let mut middleware = load(&args)?;
            middleware.package()?;
            info!("Packaged {}", middleware.display_name());
            Ok(())
        }
        Commands::Test(args) => {
            let mut middleware = load(&args)?;
            middleware.test()?;
            info!("Tested {}", middleware.display_name());
            Ok(())
        }
        Commands::PackageId(args) => {
            let mut middleware = load(&args)?;
            middleware.package_id()?;
            print!("{}", middleware.info().settings);
            Ok(())
        }
    }
}
