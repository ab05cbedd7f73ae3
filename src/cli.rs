use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sqlpilot::config::Config;
use sqlpilot::db::{self, ActiveConnection, ConnectionTarget};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a question and stream the answer to stdout
    Ask {
        /// The question, in plain language
        question: String,

        /// Saved connection profile to ask against
        #[arg(short, long)]
        profile: String,

        /// Environment variable holding the database password
        #[arg(long, default_value = "PGPASSWORD")]
        password_env: String,

        /// Run the extracted SQL and print the rows
        #[arg(long)]
        run: bool,
    },
    /// Print the DDL sent to the model for a profile
    Schema {
        #[arg(short, long)]
        profile: String,

        #[arg(long, default_value = "PGPASSWORD")]
        password_env: String,
    },
}

fn resolve_target(config: &Config, profile: &str, password_env: &str) -> Result<ConnectionTarget> {
    let profile = config
        .find_profile(profile)
        .with_context(|| format!("No saved connection profile named '{}'", profile))?;
    let password = std::env::var(password_env).unwrap_or_default();
    profile.to_target(&password)
}

pub async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Ask {
            question,
            profile,
            password_env,
            run,
        } => ask(&config, &question, &profile, &password_env, run).await,
        Command::Schema {
            profile,
            password_env,
        } => {
            let target = resolve_target(&config, &profile, &password_env)?;
            let orchestrator =
                sqlpilot::build_orchestrator(&config.llm, Arc::new(ActiveConnection::default()));
            let schema = orchestrator.schemas().get_schema(&target).await?;
            print!("{}", schema);
            Ok(())
        }
    }
}

async fn ask(config: &Config, question: &str, profile: &str, password_env: &str, run: bool) -> Result<()> {
    let target = resolve_target(config, profile, password_env)?;
    let active = ActiveConnection::new(Some(target.clone()));
    let orchestrator = sqlpilot::build_orchestrator(&config.llm, Arc::new(active));

    let mut sink = |chunk: &str| {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    };
    let answer = orchestrator.get_sql(question, Some(&mut sink)).await?;
    println!();

    let sql = answer.require_sql()?;
    if !run {
        return Ok(());
    }

    let client = db::open_client(&target).await?;
    let result = db::execute_query(&client, sql).await?;

    println!("{}", result.columns.join("\t"));
    for row in &result.rows {
        println!("{}", row.join("\t"));
    }
    println!("({} rows)", result.row_count);
    Ok(())
}
