use super::Host;
use super::common::{CommonArgs, resolve_data_dir};
use super::config::{CONFIG_FILE_NAME, Config};
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::app_err;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `tatoeba-sync.toml` in the data directory)
    #[arg(value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

pub fn init_config<H: Host>(host: &mut H, common: &CommonArgs, args: &InitArgs) -> Result<()> {
    let output = if let Some(path) = &args.output {
        path.clone()
    } else {
        let data_dir = resolve_data_dir(common)?;
        Utf8PathBuf::from_path_buf(data_dir.join(CONFIG_FILE_NAME))
            .map_err(|path| app_err!("configuration path '{}' is not valid UTF-8", path.display()))?
    };

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");
    Ok(())
}
