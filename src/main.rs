use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod advisor;
mod app;
mod config;
mod error;
mod gate;
mod grouping;
mod intake;
mod models;
mod report;
mod seed;
mod store;

use advisor::{Advisor, Conversation};
use app::{GradMap, ResetConfirmed};
use config::{AppConfig, StoreConfig};
use intake::{MajorChoice, RecordDraft};
use models::{AccessLevel, MajorFilter, PathType};
use store::{FileRecordStore, MemoryRecordStore, PgRecordStore, RecordStore};

const RESET_PROMPT: &str = "确定要重置所有数据吗？此操作不可逆。 (Reset all records for everyone?)";
const CODE_PROMPT: &str = "输入暗号 (Enter Code)";

#[derive(Parser)]
#[command(name = "gradmap")]
#[command(about = "Graduate destination map for a student cohort", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shared access code; prompted for when omitted
    #[arg(long, global = true, env = "GRADMAP_CODE", hide_env_values = true)]
    code: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, env = "GRADMAP_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema (admin)
    InitDb,
    /// List majors available as filters
    Majors,
    /// Show destinations grouped by headcount
    Groups {
        #[arg(long, default_value = MajorFilter::ALL_TOKEN)]
        major: MajorFilter,
    },
    /// Show the students heading to one destination
    Show {
        destination: String,
        #[arg(long, default_value = MajorFilter::ALL_TOKEN)]
        major: MajorFilter,
    },
    /// Record a new destination
    Add {
        #[arg(long)]
        name: String,
        /// A suggested major or any custom major
        #[arg(long, default_value = models::SUGGESTED_MAJORS[0])]
        major: String,
        #[arg(long, default_value_t = 2024)]
        year: i32,
        /// RECOMMENDATION, EXAM, WORK or ABROAD (保研 / 考研 / 工作 / 出国)
        #[arg(long = "type", default_value = "RECOMMENDATION")]
        path_type: PathType,
        #[arg(long)]
        destination: String,
        #[arg(long, default_value = "")]
        contact: String,
        #[arg(long)]
        anonymous: bool,
    },
    /// Import records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List every record (admin)
    List {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Delete a record by id (admin)
    Delete { id: String },
    /// Replace all records with the built-in seed set (admin)
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write a markdown report of the grouped view
    Report {
        #[arg(long, default_value = MajorFilter::ALL_TOKEN)]
        major: MajorFilter,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Ask the career advisor a single question
    Advise { prompt: String },
    /// Chat with the career advisor
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let gate = config.access.gate()?;
    let store = open_store(&config.store).await?;
    let mut app = GradMap::new(store.clone(), gate);
    unlock(&mut app, cli.code.as_deref())?;

    match cli.command {
        Commands::InitDb => {
            app.require(AccessLevel::Admin)?;
            let StoreConfig::Postgres { url, max_connections } = &config.store else {
                println!("The configured store has no schema to initialize.");
                return Ok(());
            };
            PgRecordStore::connect(url, *max_connections)
                .await?
                .init_db()
                .await?;
            println!("Schema ready.");
        }
        Commands::Majors => {
            app.refresh().await?;
            for major in app.majors() {
                println!("{major}");
            }
        }
        Commands::Groups { major } => {
            app.refresh().await?;
            app.set_filter(major);
            let groups = app.groups();
            if groups.is_empty() {
                println!("No destinations recorded for {}.", app.filter());
                return Ok(());
            }

            println!("Destinations for {}:", app.filter());
            for group in &groups {
                println!("- {} ({})", group.destination, group.count);
            }
        }
        Commands::Show { destination, major } => {
            app.refresh().await?;
            app.set_filter(major);
            let Some(group) = app.group(&destination) else {
                bail!("no students recorded for {destination} under {}", app.filter());
            };

            println!(
                "{} · {} · {} students",
                group.destination,
                app.filter(),
                group.count
            );
            for student in &group.students {
                println!("- {}", report::student_line(student));
            }
        }
        Commands::Add {
            name,
            major,
            year,
            path_type,
            destination,
            contact,
            anonymous,
        } => {
            let draft = RecordDraft {
                name,
                major: MajorChoice::from_input(&major),
                year,
                path_type,
                destination,
                contact,
                is_anonymous: anonymous,
            };
            let record = app.add(&draft).await?;
            println!("Added {} ({}).", record.display_name(), record.id);
        }
        Commands::Import { csv } => {
            let inserted = intake::import_csv(store.as_ref(), &csv).await?;
            println!("Imported {inserted} records from {}.", csv.display());
        }
        Commands::List { search } => {
            app.refresh().await?;
            let records = app.search(&search)?;
            if records.is_empty() {
                println!("No matching records.");
            }
            for record in records {
                println!(
                    "{}  {} · {} · {}届 · {} · {}",
                    record.id,
                    record.name,
                    record.major,
                    record.year,
                    record.path_type,
                    if record.destination.is_empty() {
                        "-"
                    } else {
                        record.destination.as_str()
                    }
                );
            }
        }
        Commands::Delete { id } => {
            app.delete(&id).await?;
            println!("Deleted {id}.");
        }
        Commands::Reset { yes } => {
            app.require(AccessLevel::Admin)?;
            if !yes && !confirm(RESET_PROMPT) {
                println!("Reset cancelled.");
                return Ok(());
            }
            app.reset(ResetConfirmed::confirmed()).await?;
            println!("Records reset to seed data.");
        }
        Commands::Report { major, out } => {
            app.refresh().await?;
            let report = report::build_report(app.records(), &major, chrono::Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Advise { prompt } => {
            let advisor = Advisor::from_config(&config.advisor)?;
            println!("{}", advisor.get_advice(&prompt).await);
        }
        Commands::Chat => {
            let advisor = Advisor::from_config(&config.advisor)?;
            chat(&advisor).await?;
        }
    }

    Ok(())
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryRecordStore::new()),
        StoreConfig::File { path } => Arc::new(FileRecordStore::new(path)),
        StoreConfig::Postgres { url, max_connections } => {
            Arc::new(PgRecordStore::connect(url, *max_connections).await?)
        }
    };
    Ok(store)
}

fn unlock(app: &mut GradMap, code: Option<&str>) -> anyhow::Result<()> {
    if let Some(code) = code {
        app.unlock(code)?;
        return Ok(());
    }

    loop {
        let code = dialoguer::Password::new()
            .with_prompt(CODE_PROMPT)
            .allow_empty_password(true)
            .interact()
            .context("no access code provided")?;
        match app.unlock(code.trim()) {
            Ok(_) => {
                eprintln!("已解锁 (unlocked as {})", app.level());
                return Ok(());
            }
            Err(error::Error::InvalidCode) => eprintln!("暗号错误 (Incorrect Code)"),
            Err(err) => return Err(err.into()),
        }
    }
}

async fn chat(advisor: &Advisor) -> anyhow::Result<()> {
    let mut conversation = Conversation::new();
    if let Some(greeting) = conversation.messages().first() {
        println!("{}", greeting.text);
    }

    // Input fails on end of input or a closed terminal; both end the chat.
    while let Ok(line) = dialoguer::Input::<String>::new()
        .with_prompt(">")
        .allow_empty(true)
        .interact_text()
    {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if let Some(reply) = conversation.ask(advisor, line).await {
            println!("{}", reply.text);
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}
