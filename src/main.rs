mod analyzer;
mod config;
mod db;
mod parser;
mod scraper;

use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "habr_scraper", about = "Habr Career vacancy scraper and skills analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Scrape listing pages into the database
    Scrape {
        /// Max listing pages to fetch
        #[arg(short = 'n', long, default_value = "50")]
        pages: usize,
    },
    /// Score unanalyzed vacancies via GigaChat
    Analyze {
        /// Max vacancies to score (default: all unscored)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + analyze in one pipeline
    Run {
        /// Max listing pages to fetch
        #[arg(short = 'n', long, default_value = "50")]
        pages: usize,
        /// Max vacancies to score (default: all unscored)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show database statistics
    Stats,
    /// Export the vacancies table to CSV
    Export {
        /// Output file path
        #[arg(short, long, default_value = "vacancies.csv")]
        out: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::load()?;

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;
            println!("Database ready: {}", settings.database.path);
            Ok(())
        }
        Commands::Scrape { pages } => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;
            let stats = scraper::scrape_listing(&conn, &settings.scrape, pages).await?;
            println!(
                "Done: {} vacancies from {} pages ({} page errors).",
                stats.cards, stats.pages, stats.errors
            );
            Ok(())
        }
        Commands::Analyze { limit } => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;
            let client = analyzer::GigaChatClient::new(settings.gigachat)?;
            let scored = analyzer::analyze_unscored(&conn, &client, limit).await?;
            println!("Scored {} vacancies.", scored);
            Ok(())
        }
        Commands::Run { pages, limit } => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;

            let t_scrape = Instant::now();
            let stats = scraper::scrape_listing(&conn, &settings.scrape, pages).await?;
            println!(
                "Scraped {} vacancies from {} pages in {:.1}s",
                stats.cards,
                stats.pages,
                t_scrape.elapsed().as_secs_f64()
            );

            let client = analyzer::GigaChatClient::new(settings.gigachat)?;
            let scored = analyzer::analyze_unscored(&conn, &client, limit).await?;
            println!("Scored {} vacancies.", scored);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:       {}", s.total);
            println!("Scored:      {}", s.scored);
            println!("Unscored:    {}", s.unscored);
            println!("With salary: {}", s.with_salary);
            println!("Remote:      {}", s.remote);
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::connect(&settings.database.path)?;
            db::init_schema(&conn)?;
            let rows = db::export_csv(&conn, &out)?;
            println!("Exported {} rows to {}", rows, out);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}
