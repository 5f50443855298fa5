use std::process::ExitCode;

mod cli;
mod commands;
mod config;
mod display;
mod io;
mod telemetry;
mod util;

fn main() -> ExitCode {
    let cli = cli::parse();
    telemetry::init();

    let ctx = display::Context::detect().with_quiet(match &cli.command {
        cli::Command::Ingest(args) => args.quiet,
        cli::Command::Inspect(args) => args.quiet,
        cli::Command::Schema(_) => true,
    });

    if ctx.interactive {
        display::print_banner();
    }

    match commands::dispatch(cli.command, ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e);
            ExitCode::FAILURE
        }
    }
}
