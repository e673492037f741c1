//! Binary entrypoint for typr-cli (made by FontLab https://www.fontlab.com/)

use env_logger::{Builder, Env};

fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = typr_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
