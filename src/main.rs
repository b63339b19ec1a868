use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sf6_report_insights::{builder, db, report, InsightsConfig, ReportLoader};

#[derive(Parser)]
#[command(name = "sf6-insights")]
#[command(
    about = "Weekly activity, rating trend and matchup insights for SF6 player reports",
    long_about = None
)]
struct Cli {
    /// TOML file overriding the default thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import matches from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Build report JSON for one or more players
    Build {
        #[arg(long, required = true)]
        player: Vec<String>,
        /// Read matches from a CSV export instead of Postgres
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, default_value = "docs/assets/data/sf6-reports")]
        out_dir: PathBuf,
    },
    /// Derive insights from a built report
    Insights {
        #[arg(long)]
        report: PathBuf,
        #[arg(long)]
        character: Option<String>,
        /// Override the stable-matchup threshold
        #[arg(long)]
        min_games: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = InsightsConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} matches from {}.", csv.display());
        }
        Commands::Build {
            player,
            csv,
            out_dir,
        } => {
            let mut from_csv = match &csv {
                Some(path) => Some(db::read_matches_by_player(path)?),
                None => None,
            };
            let pool = match &from_csv {
                Some(_) => None,
                None => Some(connect().await?),
            };
            tokio::fs::create_dir_all(&out_dir)
                .await
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            for name in &player {
                let matches = match (&mut from_csv, &pool) {
                    (Some(by_player), _) => by_player
                        .remove(&name.trim().to_lowercase())
                        .unwrap_or_default(),
                    (None, Some(pool)) => db::fetch_matches(pool, name).await?,
                    (None, None) => anyhow::bail!("no match source for {name}"),
                };
                if matches.is_empty() {
                    println!("No matches found for {name}; skipping.");
                    continue;
                }

                let built = builder::build_player_report(name, &matches, &config, Utc::now())?;
                let out = out_dir.join(format!("{}.json", name.trim().to_lowercase()));
                let json = serde_json::to_string_pretty(&built)?;
                tokio::fs::write(&out, json)
                    .await
                    .with_context(|| format!("failed to write {}", out.display()))?;
                info!(player = %name, matches = matches.len(), "report written");
                println!("Report for {name} written to {}.", out.display());
            }
        }
        Commands::Insights {
            report: report_path,
            character,
            min_games,
            format,
            out,
        } => {
            if let Some(min_games) = min_games {
                config.matchups.min_stable_games = min_games;
            }
            let loader = ReportLoader::new(config);
            let Some(insights) = loader.load(&report_path, character.as_deref()).await? else {
                println!("Report load was superseded.");
                return Ok(());
            };

            let rendered = match format {
                OutputFormat::Markdown => {
                    report::render_markdown(&insights, loader.config().matchups.top_n)
                }
                OutputFormat::Json => serde_json::to_string_pretty(&insights)?,
            };

            match out {
                Some(out) => {
                    tokio::fs::write(&out, rendered)
                        .await
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Insights written to {}.", out.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}
