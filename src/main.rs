//! sysdelta CLI: change-tracked edits of provisioning-server system records.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sysdelta",
    version,
    about = "Emit a provisioning edit command covering only a system record's changed fields"
)]
struct Cli {
    #[command(subcommand)]
    command: sysdelta::cli::Commands,

    #[command(flatten)]
    conn: sysdelta::cli::ConnectionArgs,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    sysdelta::cli::init_logging(cli.verbose);
    if let Err(e) = sysdelta::cli::dispatch(cli.command, &cli.conn) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
