//! Migration command for upgrading the local config file's version.

use super::config::fill_layer_requirements;
use crate::config::{
    CURRENT_VERSION, Config, ConfigLoader, ConfigPaths, ConfigTier, DEFAULT_VERSION, plan,
};
use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;

/// Arguments for the migrate command.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Target version
    #[arg(long, default_value = CURRENT_VERSION)]
    pub to: String,

    /// Perform migration without prompting for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Show what would be migrated without making changes.
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the migration command.
pub fn run_migrate(args: &MigrateArgs, paths: ConfigPaths) -> Result<()> {
    let loader = ConfigLoader::builder().paths(paths).no_cache().build();
    let path = loader.paths.local_file();

    let Some(config) = loader
        .read_layer(ConfigTier::Local, &path)
        .context("failed to read local configuration")?
    else {
        println!("No migration needed: '{}' does not exist.", path.display());
        return Ok(());
    };

    let from = if config.version.is_empty() {
        DEFAULT_VERSION
    } else {
        config.version.as_str()
    };
    let (migrated, warnings) = config.migrate_version(&args.to)?;

    println!("Migration plan:");
    println!("  File: {}", path.display());
    println!("  From: {}", from);
    println!("  To:   {}", args.to);
    println!();

    let steps = plan(from, &args.to)?;
    if steps.is_empty() && warnings.is_empty() {
        println!("  (already up to date)");
    } else {
        for step in &steps {
            println!("  step {} -> {}", step.from, step.to);
        }
        for warning in &warnings {
            println!("  {}", warning);
        }
    }
    println!();

    if migrated == config {
        println!("Nothing to change.");
        return Ok(());
    }

    if args.dry_run {
        println!("Dry run: No changes made.");
        return Ok(());
    }

    // Confirm unless --yes
    if !args.yes {
        println!("This will rewrite '{}'.", path.display());
        print!("Continue? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Migration cancelled.");
            return Ok(());
        }
    }

    // Tiers below the local file supply anything it leaves out.
    let merged = ConfigLoader::builder()
        .paths(loader.paths.clone())
        .no_cache()
        .load()
        .map(ConfigLoader::into_config)
        .unwrap_or_else(|_| Config::defaults());
    let mut migrated = migrated;
    fill_layer_requirements(&mut migrated, &merged);

    loader
        .save(&migrated, &path)
        .context("failed to write migrated configuration")?;
    println!("Migration complete!");

    Ok(())
}
