use super::{open_runtime, Runtime};
use crate::Result;
use std::fs;
use wikitool_core::settings::{EMBEDDED_SITE_CONFIG, SITE_CONFIG_RELPATH};
use wikitool_store::migrate;
use wikitool_sync::InitOptions;

/// Initialize the project layout: namespace folders, site configuration,
/// database schema.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Also create the template bucket folders.
    #[arg(long, default_value_t = false)]
    templates: bool,

    /// Register every existing file in the database after initializing.
    #[arg(long, default_value_t = false)]
    from_files: bool,
}

pub async fn main(args: Args) -> Result<()> {
    let Runtime {
        settings, site, db, fs,
    } = open_runtime()?;

    let created = fs.ensure_content_folders()?;
    let mut created_count = created.len();
    if args.templates {
        created_count += fs.ensure_template_folders()?.len();
    }

    let config_path = settings.project_root.join(SITE_CONFIG_RELPATH);
    let wrote_config = if config_path.exists() {
        false
    } else {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, EMBEDDED_SITE_CONFIG)?;
        true
    };

    let report = migrate::run_migrations(&db)?;

    println!(
        "initialized {root}",
        root = settings.project_root.display()
    );
    println!("  folders created:     {created_count}");
    println!(
        "  site config:         {}",
        if wrote_config { "written" } else { "kept existing" }
    );
    println!(
        "  schema version:      {version} ({applied} migration(s) applied)",
        version = report.current_version,
        applied = report.applied.len()
    );

    if args.from_files {
        let engine =
            wikitool_sync::SyncEngine::new(db, fs, wikitool_sync::OfflineClient, site);
        let report = engine.init_from_files(&InitOptions {
            include_templates: args.templates,
        })?;
        println!(
            "  files registered:    {imported} new, {unchanged} unchanged, {errors} error(s)",
            imported = report.imported,
            unchanged = report.unchanged,
            errors = report.errors.len()
        );
    }

    Ok(())
}
