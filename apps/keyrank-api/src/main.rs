use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = keyrank_api::Args::parse();

	keyrank_api::run(args).await
}
