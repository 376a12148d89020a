//! Fulfillment CLI - database migrations and order administration.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! fulfillment-cli migrate
//!
//! # Update an order's status
//! fulfillment-cli order status <ORDER_ID> shipped
//! fulfillment-cli order status <ORDER_ID> delivered --payment paid
//!
//! # Purge an order
//! fulfillment-cli order purge <ORDER_ID>
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `order status` - Update an order's status
//! - `order purge` - Permanently delete an order

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fulfillment-cli")]
#[command(author, version, about = "Fulfillment service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Administer orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Assign a new status to an order
    Status {
        /// Order ID (UUID)
        id: String,

        /// New status (`pending`, `confirmed`, `shipped`, `delivered`, `cancelled`)
        status: String,

        /// New payment status (`pending`, `paid`, `failed`)
        #[arg(short, long)]
        payment: Option<String>,
    },
    /// Permanently delete an order
    Purge {
        /// Order ID (UUID)
        id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Order { action } => match action {
            OrderAction::Status {
                id,
                status,
                payment,
            } => commands::order::update_status(&id, &status, payment.as_deref()).await?,
            OrderAction::Purge { id } => commands::order::purge(&id).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_status_with_payment() {
        let cli = Cli::try_parse_from([
            "fulfillment-cli",
            "order",
            "status",
            "0b9e4c1a-7d2f-4e55-9a61-3c8f02ab5d9e",
            "delivered",
            "--payment",
            "paid",
        ])
        .map_err(|e| e.to_string());
        assert!(matches!(
            cli,
            Ok(Cli {
                command: Commands::Order {
                    action: OrderAction::Status { payment: Some(_), .. }
                }
            })
        ));
    }
}
