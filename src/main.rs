// Interlock bundler
// Entry point for the command line

use interlock::cli::CliHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let handler = CliHandler::new();

    if let Err(e) = handler.run().await {
        eprintln!("{}", e.format_detailed());
        std::process::exit(1);
    }
    Ok(())
}
