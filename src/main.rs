mod admin;
mod args;

use clap::Parser;
use log::{debug, LevelFilter};

use crate::admin::*;
use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    debug!("args: {:?}", args);

    let res = match &args.command {
        Command::Import(a) => run_import_job(a),
        Command::Template(a) => run_template(a),
        Command::Export(a) => run_export(a),
    };

    if let Err(e) = res {
        report_error(&e);
        std::process::exit(1);
    }
}
