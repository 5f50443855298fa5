mod ingest;
mod inspect;
mod schema;

use ingest::run_ingest;
use inspect::run_inspect;
use schema::run_schema;

use anyhow::Result;

use crate::cli::Command;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Ingest(args) => run_ingest(args, ctx),
        Command::Schema(args) => run_schema(args),
        Command::Inspect(args) => run_inspect(args, ctx),
    }
}
