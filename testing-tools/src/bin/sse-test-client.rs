use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

use testing_tools::output::print_test_summary;
use testing_tools::scenarios;
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the push server (e.g., http://localhost:3201)
    #[arg(long)]
    base_url: String,

    /// Path of the push endpoint
    #[arg(long, default_value = "/events/test")]
    path: String,

    /// Number of subscribers to connect
    #[arg(long, default_value_t = 3)]
    clients: usize,

    /// Seconds to wait for each expected event
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Every subscriber receives keepalives
    ConnectionTest,
    /// Remaining subscribers keep receiving after one disconnects
    DisconnectTest,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), cli.path);
    let timeout = Duration::from_secs(cli.timeout_secs);

    println!("\n{} Establishing SSE connections to {}...", "→".blue(), url);
    let mut connections = Vec::with_capacity(cli.clients);
    for n in 1..=cli.clients {
        let connection = Connection::establish(&url, format!("Client {n}")).await?;
        println!("{} {} SSE connection established", "✓".green(), connection.label);
        connections.push(connection);
    }

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&mut connections, timeout).await?);
        }
        ScenarioChoice::DisconnectTest => {
            results.push(scenarios::test_disconnect(&mut connections, timeout).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&mut connections, timeout).await?);
            results.push(scenarios::test_disconnect(&mut connections, timeout).await?);
        }
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
