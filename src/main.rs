use clap::Parser;
use log::{debug, warn};
use serde_json::json;

mod args;
mod survey;

fn main() {
    let args = args::Args::parse();

    // RUST_LOG still takes precedence over --verbose.
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    match survey::run(&args) {
        Ok(js) => match serde_json::to_string_pretty(&js) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                warn!("Could not print the result: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            warn!("Error occured {:?}", e);
            println!("{}", json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    }
}
