//! query-gate - A read-only SQL query gateway.

use query_gate::cli::{read_request_arg, read_sql_arg, Cli, Command};
use query_gate::config::Config;
use query_gate::db::{sample_database_info, seed_sample_database};
use query_gate::error::Result;
use query_gate::logging;
use query_gate::query::{Gateway, QueryRequest, ResponseBody};
use serde::Serialize;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    let cli = Cli::parse_args();
    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            print_json(&e.to_body(), cli.pretty);
            1
        }
    };
    std::process::exit(code);
}

/// Runs the selected command and returns the process exit code.
async fn run(cli: &Cli) -> Result<i32> {
    let config = cli.load_config()?;

    match &cli.command {
        Command::Query { sql } => {
            let sql = read_sql_arg(sql)?;
            let gateway = Gateway::new(&config)?;
            Ok(respond(gateway.execute(&sql).await, cli.pretty))
        }
        Command::Request { path } => {
            let body = read_request_arg(path)?;
            let request = QueryRequest::from_json(&body)?;
            let gateway = Gateway::new(&config)?;
            Ok(respond(gateway.handle(request).await, cli.pretty))
        }
        Command::Info => {
            let info = sample_database_info(&config.sample_path(), config.limits.busy_timeout())
                .await?;
            print_json(&info, cli.pretty);
            Ok(0)
        }
        Command::SeedSample { force } => seed(&config, *force, cli.pretty).await,
    }
}

async fn seed(config: &Config, force: bool, pretty: bool) -> Result<i32> {
    let path = config.sample_path();
    seed_sample_database(&path, force).await?;

    let info = sample_database_info(&path, config.limits.busy_timeout()).await?;
    print_json(&info, pretty);
    Ok(0)
}

fn respond(result: Result<query_gate::ResultSet>, pretty: bool) -> i32 {
    let body = ResponseBody::from(result);
    print_json(&body, pretty);
    if body.is_success() {
        0
    } else {
        1
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(e) => error!("Failed to render JSON output: {e}"),
    }
}
