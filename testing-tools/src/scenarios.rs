use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

const KEEPALIVE_EVENT: &str = "keepalive";

/// Every connection must receive a keepalive within `timeout`.
pub async fn test_connection(
    connections: &mut [Connection],
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection Test ===".bright_cyan().bold());
    println!(
        "{}",
        "Checking that every subscriber receives keepalive frames".bright_white()
    );

    let mut missing = Vec::new();
    for (index, connection) in connections.iter_mut().enumerate() {
        println!(
            "{} Waiting for {} to receive a keepalive...",
            "→".blue(),
            connection.label
        );
        match connection.wait_for_event(KEEPALIVE_EVENT, timeout).await {
            Ok(event) => print_event(index, &connection.label, &event),
            Err(e) => {
                println!("{} {}: {}", "✗".red(), connection.label, e);
                missing.push(connection.label.clone());
            }
        }
    }

    if missing.is_empty() {
        println!("{} All subscribers are receiving keepalives", "✓".green());
        Ok(TestResult {
            scenario: "connection_test".to_string(),
            passed: true,
            message: Some(format!(
                "{} SSE connections established and kept alive",
                connections.len()
            )),
            duration: start.elapsed(),
        })
    } else {
        Ok(TestResult {
            scenario: "connection_test".to_string(),
            passed: false,
            message: Some(format!("No keepalive for: {}", missing.join(", "))),
            duration: start.elapsed(),
        })
    }
}

/// Drops the first connection and checks the others keep receiving keepalives.
pub async fn test_disconnect(
    connections: &mut Vec<Connection>,
    timeout: Duration,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Disconnect Test ===".bright_cyan().bold());

    if connections.len() < 2 {
        return Ok(TestResult {
            scenario: "disconnect_test".to_string(),
            passed: false,
            message: Some("At least two connections are needed".to_string()),
            duration: start.elapsed(),
        });
    }

    let leaving = connections.remove(0);
    println!("{} Disconnecting {}...", "→".blue(), leaving.label);
    leaving.disconnect();

    // Let the server notice the closed socket before checking the others
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut result = test_connection(connections, timeout).await?;
    result.scenario = "disconnect_test".to_string();
    if result.passed {
        result.message = Some(format!(
            "{} remaining subscribers unaffected by a disconnect",
            connections.len()
        ));
    }
    Ok(result)
}
