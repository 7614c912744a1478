//! Kibble CLI - cart and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the subscription half of the cart with totals
//! kibble cart show --mode subscription
//!
//! # Change a quantity or a delivery cycle
//! kibble cart set-quantity 12 3
//! kibble cart set-cycle 12 4w
//!
//! # Check out selected subscription rows with a completed payment
//! kibble checkout cart --mode subscription --items 12,14 --transaction tx_1234 --agree-all
//!
//! # Buy a product straight from a product-page link
//! kibble checkout buy-now "product_id=7&price=32000&type=subscription&cycle=4w" --transaction tx_1234 --agree-all
//! ```
//!
//! # Environment Variables
//!
//! See `kibble_storefront::config`. `--token` overrides `KIBBLE_ACCESS_TOKEN`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kibble_core::{CartItemId, DeliveryCycle, ProductId, PurchaseMode};
use kibble_storefront::api::AccessToken;
use kibble_storefront::checkout::Consents;
use kibble_storefront::config::{ConfigError, StorefrontConfig};
use kibble_storefront::error::{AppError, Result};
use kibble_storefront::state::StorefrontContext;

mod commands;

#[derive(Parser)]
#[command(name = "kibble")]
#[command(author, version, about = "Kibble storefront cart and checkout")]
struct Cli {
    /// Bearer token of the signed-in user
    #[arg(long, global = true)]
    token: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for and order products
    Checkout {
        #[command(subcommand)]
        source: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart rows with totals
    Show {
        /// Only rows of this purchase mode (`oneTime`, `subscription`)
        #[arg(short, long)]
        mode: Option<PurchaseMode>,
    },
    /// Put a product into the cart
    Add {
        /// Catalog product ID
        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Purchase mode (`oneTime`, `subscription`)
        #[arg(short, long, default_value = "oneTime")]
        mode: PurchaseMode,

        /// Delivery cycle for subscriptions (`2w`, `4w`)
        #[arg(short, long)]
        cycle: Option<DeliveryCycle>,
    },
    /// Change the quantity of a row
    SetQuantity { item: CartItemId, quantity: u32 },
    /// Change the delivery cycle of a subscription row
    SetCycle { item: CartItemId, cycle: DeliveryCycle },
    /// Delete rows
    Remove {
        #[arg(required = true)]
        items: Vec<CartItemId>,
    },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Check out rows of the cart
    Cart {
        /// Purchase mode of the rows being bought
        #[arg(short, long)]
        mode: PurchaseMode,

        /// Rows to buy; defaults to every row of the mode
        #[arg(short, long, value_delimiter = ',')]
        items: Vec<CartItemId>,

        #[command(flatten)]
        payment: PaymentArgs,
    },
    /// Buy a single product from a product-page query string
    BuyNow {
        /// Query string, e.g. `product_id=7&price=32000&quantity=2`
        query: String,

        #[command(flatten)]
        payment: PaymentArgs,
    },
}

#[derive(Args)]
struct PaymentArgs {
    /// Transaction reference of the completed payment
    #[arg(long)]
    transaction: String,

    /// Agree to the order terms
    #[arg(long)]
    agree_order: bool,

    /// Agree to sharing details with third parties
    #[arg(long)]
    agree_third_party: bool,

    /// Agree to recurring payment (subscriptions)
    #[arg(long)]
    agree_auto_pay: bool,

    /// Give every agreement
    #[arg(long)]
    agree_all: bool,
}

impl PaymentArgs {
    const fn consents(&self) -> Consents {
        if self.agree_all {
            return Consents::all();
        }
        Consents {
            order: self.agree_order,
            third_party: self.agree_third_party,
            auto_pay: self.agree_auto_pay,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Warnings and errors become Sentry events, info and debug breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

/// Report a configuration error before logging is set up, then exit.
#[allow(clippy::print_stderr)]
fn config_failure(error: &ConfigError) -> ! {
    eprintln!("Failed to load configuration: {error}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => config_failure(&e),
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kibble_storefront=info,kibble=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        e.report();
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<()> {
    let context = StorefrontContext::new(config)?;
    let token = cli
        .token
        .map(AccessToken::new)
        .or_else(|| context.access_token())
        .ok_or_else(|| {
            AppError::Unauthorized("set KIBBLE_ACCESS_TOKEN or pass --token".to_string())
        })?;
    let output = commands::Output::new(cli.json);

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show { mode } => commands::cart::show(&context, &token, mode, output).await,
            CartAction::Add {
                product,
                quantity,
                mode,
                cycle,
            } => commands::cart::add(&context, &token, product, quantity, mode, cycle, output).await,
            CartAction::SetQuantity { item, quantity } => {
                commands::cart::set_quantity(&context, &token, item, quantity, output).await
            }
            CartAction::SetCycle { item, cycle } => {
                commands::cart::set_cycle(&context, &token, item, cycle, output).await
            }
            CartAction::Remove { items } => {
                commands::cart::remove(&context, &token, &items, output).await
            }
        },
        Commands::Checkout { source } => match source {
            CheckoutAction::Cart {
                mode,
                items,
                payment,
            } => {
                commands::checkout::from_cart(
                    &context,
                    &token,
                    mode,
                    &items,
                    &payment.transaction,
                    &payment.consents(),
                    output,
                )
                .await
            }
            CheckoutAction::BuyNow { query, payment } => {
                commands::checkout::buy_now(
                    &context,
                    &token,
                    &query,
                    &payment.transaction,
                    &payment.consents(),
                    output,
                )
                .await
            }
        },
    }
}
