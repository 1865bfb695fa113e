use clap::Parser;

use luat_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	luat_eval::run(args).await
}
