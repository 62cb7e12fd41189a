mod explore;
mod fetch;

use explore::run_explore;
use fetch::run_fetch;

use anyhow::Result;

use crate::cli::Command;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Fetch(args) => run_fetch(args, ctx),
        Command::Explore(args) => run_explore(args, ctx),
    }
}
