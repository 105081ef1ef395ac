//! Config subcommand handlers.

use sentinel_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        ConfigCommand::Path => sentinel_config::config_path().display().to_string(),
        ConfigCommand::Show => {
            let cfg = config::effective_config(global)?;
            show(&cfg, global.output)?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Text formats print the config as it would appear on disk.
fn show(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            Ok(sentinel_config::to_toml(cfg)?.trim_end().to_owned())
        }
        structured => output::render_single(structured, cfg, |_| String::new(), |_| String::new()),
    }
}
