/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use kokopi_controller::cli::commands;
use kokopi_controller::cli::{parse_cli, Commands};
use kokopi_utils::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_cli();

    let config = Settings::new(
        cli.config
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned()),
    )?;
    kokopi_utils::logging::init_with_format(&config.log.level, &config.log.format)?;

    match cli.command {
        Commands::Serve => {
            commands::serve(&config).await?;
        }
        Commands::Render(args) => {
            print!("{}", commands::render(&config, &args)?);
        }
    }

    Ok(())
}
