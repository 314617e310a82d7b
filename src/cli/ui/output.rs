use console::style;

use crate::ai::{CheckResult, CircuitBreakerStats, CircuitState};
use crate::tasks::ApiResponse;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Envelope body on stdout; the status line goes to stderr so stdout stays JSON
    pub fn envelope(&self, response: &ApiResponse) {
        println!("{}", response.to_pretty_json());
        if response.is_success() {
            eprintln!("{}", style(format!("HTTP {}", response.status)).dim());
        } else {
            eprintln!("{}", style(format!("HTTP {}", response.status)).red());
        }
    }

    pub fn check(&self, check: &CheckResult) {
        let mark = if check.passed {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("{} {:<28} {}", mark, check.name, check.message);
        if let Some(warning) = &check.warning {
            println!("  {} {}", style("⚠").yellow(), warning);
        }
    }

    pub fn breaker(&self, stats: &CircuitBreakerStats) {
        let state = match stats.state {
            CircuitState::Closed => style("closed").green(),
            CircuitState::HalfOpen => style("half-open").yellow(),
            CircuitState::Open => style("open").red(),
        };
        eprintln!("  {:<48} {}", stats.name, state);
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
