use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = luat_api::Args::parse();

	luat_api::run(args).await
}
