use clap::Parser;
use colored::Colorize;
use link_preview_card::{
    log_preview_card, setup_logging, truncate_str, Fetcher, FetcherConfig, LinkPreviewCard,
    LogConfig,
};
use std::error::Error;

/// Fetch a link's metadata and show the resulting preview card.
#[derive(Parser, Debug)]
#[command(name = "preview_card")]
struct Args {
    /// Link to preview
    link: String,

    /// Host string used to pick the default theme
    #[arg(long)]
    herf: Option<String>,

    /// Print the rendered card markup
    #[arg(long)]
    html: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    setup_logging(LogConfig {
        log_level: args.log_level.clone(),
        file_output: false,
        ..LogConfig::default()
    })?;

    let card = LinkPreviewCard::with_fetcher(Fetcher::new_with_config(FetcherConfig::from_env())?);
    if let Some(herf) = &args.herf {
        card.set_attribute("herf", herf)?;
    }

    println!("{}", "Link Preview Card".bold().green());
    println!("{}", "=================".green());

    card.fetch_data(&args.link).await;
    let state = card.state();
    log_preview_card(&state);

    println!("{}: {}", "Link".bold(), state.link);
    println!("{}: {}", "Title".bold(), state.title);
    println!("{}: {}", "Description".bold(), truncate_str(&state.description, 100));
    println!("{}: {}", "Image".bold(), state.image);
    println!("{}: {}", "URL".bold(), state.url);
    println!("{}: {}", "Theme".bold(), state.theme_color);

    if args.html {
        println!("\n{}", card.render());
    }

    Ok(())
}
