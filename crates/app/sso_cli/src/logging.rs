pub mod formats;

use flexi_logger::Logger;

use crate::Error;

fn default_spec(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Log to stderr so stdout carries only command output.
pub fn init(verbose: u8) -> Result<(), Error> {
    Logger::try_with_env_or_str(default_spec(verbose))?
        .format(formats::cli_format)
        .log_to_stderr()
        .start()?;

    Ok(())
}
