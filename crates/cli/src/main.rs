//! PetVerse CLI - drive the PetVerse API from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Get a token for an account (persisted when PETVERSE_TOKEN_FILE is set)
//! pv login -e kim@example.com
//!
//! # Browse and shop
//! pv products list --category food --sort price-asc
//! pv cart add 66a1f0
//! pv cart show
//! pv checkout --transaction-id pi_3Nx...
//!
//! # Book a grooming appointment
//! pv book grooming --pet-name Biscuit --pet-type dog --service "Full Groom" \
//!     --date 2026-11-02 --time 14:30 --name "Kim Lee" --phone 555-0101
//!
//! # Admin dashboard
//! pv dashboard --top 5
//! ```
//!
//! Configuration comes from `PETVERSE_*` environment variables (see
//! `petverse_client::config`). Logs go to stderr; `--json` switches them to
//! JSON lines.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use petverse_client::{AppState, ClientConfig};
use petverse_core::{AppointmentKind, AppointmentStatus};
use rust_decimal::Decimal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "pv")]
#[command(author, version, about = "PetVerse command-line client")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange an account email for an API token
    Login {
        #[arg(short, long)]
        email: String,

        /// Display name used on forum posts
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the cart with a gateway-confirmed transaction
    Checkout {
        /// Payment intent ID confirmed by the gateway
        #[arg(long)]
        transaction_id: Option<String>,
    },
    /// Book a grooming or healthcare appointment
    Book(BookArgs),
    /// List or update appointments
    Appointments {
        #[command(subcommand)]
        action: AppointmentAction,
    },
    /// Community forum
    Forum {
        #[command(subcommand)]
        action: ForumAction,
    },
    /// Payment history (all orders with --all, admin)
    Orders {
        #[arg(long)]
        all: bool,
    },
    /// Show or update the signed-in profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Admin analytics
    Dashboard {
        /// How many best sellers to list
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products, filtered and sorted client-side
    List(ProductFilterArgs),
    /// Show one product
    Show { id: String },
}

#[derive(Args)]
struct ProductFilterArgs {
    /// Match against name and brand
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    pet_type: Option<String>,
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    #[arg(long)]
    in_stock: bool,
    /// featured, price-asc, price-desc, newest, rating or name
    #[arg(long, default_value = "featured")]
    sort: String,
}

#[derive(Subcommand)]
enum CartAction {
    /// Reload and show the cart
    Show,
    /// Add one unit of a product
    Add {
        product_id: String,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Increase a line's quantity by one
    Inc {
        product_id: String,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Decrease a line's quantity by one, removing it at 1
    Dec {
        product_id: String,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Remove a line
    Remove {
        product_id: String,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
struct BookArgs {
    /// grooming or healthcare
    kind: AppointmentKind,
    #[arg(long)]
    pet_name: String,
    #[arg(long)]
    pet_type: String,
    #[arg(long)]
    pet_age: Option<String>,
    #[arg(long)]
    service: String,
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,
    /// HH:MM
    #[arg(long)]
    time: String,
    /// Owner name
    #[arg(long)]
    name: String,
    /// Owner email (defaults to the signed-in user)
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum AppointmentAction {
    /// List your appointments (every appointment with --all, admin)
    List {
        kind: AppointmentKind,
        #[arg(long)]
        all: bool,
    },
    /// Move an appointment to a new status (admin)
    SetStatus {
        kind: AppointmentKind,
        id: String,
        status: AppointmentStatus,
    },
    /// List services offered for a kind
    Services { kind: AppointmentKind },
}

#[derive(Subcommand)]
enum ForumAction {
    /// List threads, newest first
    List,
    /// Show a thread with its comments
    Show { id: String },
    /// Start a thread
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// Comment on a thread
    Comment { id: String, text: String },
    /// Like or unlike a thread
    Like { id: String },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Defaults to info for our crates if `RUST_LOG` is not set.
fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "petverse_client=info,petverse_cli=info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    let state = AppState::new(config)?;

    match cli.command {
        Commands::Login { email, name } => commands::auth::login(&state, &email, name).await?,
        Commands::Logout => commands::auth::logout(&state),
        Commands::Products { action } => match action {
            ProductAction::List(args) => commands::products::list(&state, args).await?,
            ProductAction::Show { id } => commands::products::show(&state, &id).await?,
        },
        Commands::Cart { action } => commands::cart::run(&state, action).await?,
        Commands::Checkout { transaction_id } => {
            commands::cart::checkout(&state, transaction_id.as_deref()).await?;
        }
        Commands::Book(args) => commands::appointments::book(&state, args).await?,
        Commands::Appointments { action } => commands::appointments::run(&state, action).await?,
        Commands::Forum { action } => commands::forum::run(&state, action).await?,
        Commands::Orders { all } => commands::orders::list(&state, all).await?,
        Commands::Profile { action } => commands::auth::profile(&state, action).await?,
        Commands::Dashboard { top } => commands::orders::dashboard(&state, top).await?,
    }
    Ok(())
}
