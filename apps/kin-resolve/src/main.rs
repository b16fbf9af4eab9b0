// crates.io
use clap::Parser;
// self
use kin_resolve::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	kin_resolve::run(args).await
}
