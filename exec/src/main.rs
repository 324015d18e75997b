//! Entry-point for the `sift-exec` binary.
use clap::Parser;
use sift_exec::Cli;
use sift_exec::run_main;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let exit_code = runtime.block_on(async {
        let cli = Cli::parse();
        run_main(cli).await
    })?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
