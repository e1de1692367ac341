//! Palma CLI - Database migrations and storefront tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! palma migrate
//!
//! # List active products
//! palma catalog list
//!
//! # Work with the anonymous cart (stored under PALMA_LOCAL_STORE_DIR)
//! palma cart add 3
//! palma cart show
//!
//! # Work with a signed-in cart (stored in PostgreSQL)
//! palma cart set 3 4 --user u1
//!
//! # Place an order for a signed-in cart
//! palma checkout --user u1 --address "12 Palm Avenue" --city Lagos --state Lagos --phone 0800
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `catalog list` - List active products
//! - `cart` - Show or edit a cart
//! - `checkout` - Place an order

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use palma_core::PaymentMethod;
use palma_storefront::config::StorefrontConfig;
use palma_storefront::error::AppError;
use palma_storefront::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "palma")]
#[command(author, version, about = "Palma storefront tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Browse the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Show or edit a cart
    Cart {
        /// Signed-in user the cart belongs to (anonymous cart if omitted)
        #[arg(short, long, global = true)]
        user: Option<String>,

        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for a signed-in cart
    Checkout {
        /// Signed-in user placing the order
        #[arg(short, long)]
        user: String,

        /// Street address
        #[arg(long)]
        address: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        state: String,

        #[arg(long)]
        postal_code: Option<String>,

        /// Contact phone number
        #[arg(long)]
        phone: String,

        /// Payment method (`paystack`, `bank-transfer`, `cash-on-delivery`)
        #[arg(long, default_value = "paystack")]
        payment: PaymentMethod,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List active products, newest first
    List,
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        product_id: i32,
    },
    /// Remove a product's line
    Remove {
        product_id: i32,
    },
    /// Set a line's quantity (zero or less removes it)
    Set {
        product_id: i32,
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing();
            AppError::from(e).report();
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing();

    if let Err(e) = run(cli, config).await {
        e.report();
        #[allow(clippy::print_stderr)]
        {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), AppError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront(&config).await?,
        Commands::Catalog { action } => match action {
            CatalogAction::List => commands::catalog::list(&config).await?,
        },
        Commands::Cart { user, action } => {
            commands::cart::run(config, user.as_deref(), action).await?;
        }
        Commands::Checkout {
            user,
            address,
            city,
            state,
            postal_code,
            phone,
            payment,
        } => {
            let shipping = palma_storefront::checkout::ShippingDetails {
                address,
                city,
                state,
                postal_code,
                phone,
            };
            commands::checkout::place_order(config, &user, &shipping, payment).await?;
        }
    }
    Ok(())
}
