// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use finbot::{cli, commands, config::Settings, db, migrations};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let settings = Settings::load(
        matches.get_one::<String>("db").map(|s| s.as_str()),
        matches.get_flag("verbose"),
    )?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut conn = db::open_or_init(&settings)?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!(
                "Database ready at {} (schema version {})",
                settings.database_path.display(),
                migrations::current_version(&conn)?
            );
        }
        Some(("schema", sub)) => commands::schema::handle(&conn, sub)?,
        Some(("user", sub)) => commands::users::handle(&conn, sub)?,
        Some(("stock", sub)) => commands::stocks::handle(&mut conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&conn, sub)?,
        Some(("holdings", sub)) => commands::holdings::handle(&conn, sub)?,
        Some(("gains", sub)) => commands::gains::handle(&conn, sub)?,
        Some(("import", sub)) => commands::importer::handle(&mut conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
