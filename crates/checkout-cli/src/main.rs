//! # cravt-checkout
//!
//! Cart management and checkout against the Cravt API from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! export CRAVT_API_BASE_URL=http://localhost:5000/api
//! export CRAVT_AUTH_TOKEN=...
//!
//! cravt-checkout cart add --item-id 12 --name "Masala Dosa" --price 120 --restaurant-id 3
//! cravt-checkout checkout --order-type dine_in --time "2025-10-14 18:30:00" --coupon SAVE10
//! ```

use checkout_cli::commands::{self, CheckoutRequest};
use checkout_cli::context::{self, AppContext};
use checkout_core::{CustomerContact, MenuItem, MenuItemId, OrderType, RestaurantId};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cravt-checkout", about = "Cravt cart and checkout", version, long_about = None)]
struct Cli {
    /// File holding the persisted cart
    #[arg(long, env = "CRAVT_CART_FILE", global = true)]
    cart_file: Option<PathBuf>,

    /// Scope the cart to this user id
    #[arg(long, env = "CRAVT_USER_ID", global = true)]
    user_id: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect or change the cart
    Cart(CartCommand),
    /// List available time slots for a restaurant
    Slots(SlotsArgs),
    /// List coupons applicable at a restaurant
    Coupons(CouponsArgs),
    /// Place the order in the cart and pay for it
    Checkout(CheckoutArgs),
    /// End the session and clear the cart
    Logout,
}

#[derive(Debug, Args)]
struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    Show,
    Add(AddArgs),
    Update {
        #[arg(long)]
        item_id: MenuItemId,
        #[arg(long)]
        quantity: u32,
    },
    Remove {
        #[arg(long)]
        item_id: MenuItemId,
    },
    Clear,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    item_id: MenuItemId,

    #[arg(long)]
    name: String,

    /// Unit price, e.g. 120.50
    #[arg(long)]
    price: String,

    #[arg(long)]
    restaurant_id: RestaurantId,
}

#[derive(Debug, Args)]
struct SlotsArgs {
    #[arg(long)]
    restaurant_id: RestaurantId,

    /// First day to list (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct CouponsArgs {
    #[arg(long)]
    restaurant_id: RestaurantId,
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    /// takeaway or dine_in
    #[arg(long, default_value = "takeaway")]
    order_type: OrderType,

    /// Schedule a takeaway order for later
    #[arg(long)]
    later: bool,

    /// Scheduled day (date value from `slots`)
    #[arg(long)]
    date: Option<String>,

    /// Scheduled time (slot value from `slots`)
    #[arg(long)]
    time: Option<String>,

    #[arg(long)]
    coupon: Option<String>,

    /// Name to prefill in the payment form
    #[arg(long)]
    name: Option<String>,

    /// Email to prefill in the payment form
    #[arg(long)]
    email: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let cart_file = cli.cart_file.unwrap_or_else(context::default_cart_file);
    let ctx = AppContext::new(&cart_file, cli.user_id.as_deref())?;
    let today = chrono::Local::now().date_naive();
    let mut out = std::io::stdout();

    match cli.command {
        Commands::Cart(CartCommand { command }) => match command {
            CartSubcommand::Show => commands::cart_show(&ctx.cart, &mut out),
            CartSubcommand::Add(args) => {
                let price = commands::parse_price(&args.price, ctx.settings.currency)?;
                let item = MenuItem::new(args.item_id, args.name, price);
                commands::cart_add(&ctx.cart, item, args.restaurant_id, &mut out)
            }
            CartSubcommand::Update { item_id, quantity } => {
                commands::cart_update(&ctx.cart, item_id, quantity, &mut out)
            }
            CartSubcommand::Remove { item_id } => {
                commands::cart_remove(&ctx.cart, item_id, &mut out)
            }
            CartSubcommand::Clear => commands::cart_clear(&ctx.cart, &mut out),
        },
        Commands::Slots(args) => {
            let date = args.date.unwrap_or(today);
            commands::slots(&ctx, args.restaurant_id, date, &mut out).await
        }
        Commands::Coupons(args) => commands::coupons(&ctx, args.restaurant_id, &mut out).await,
        Commands::Checkout(args) => {
            let request = CheckoutRequest {
                order_type: args.order_type,
                later: args.later,
                date: args.date,
                time: args.time,
                coupon: args.coupon,
                contact: CustomerContact::new(args.name, args.email),
            };
            commands::checkout(&ctx, request, today, &mut out).await
        }
        Commands::Logout => commands::logout(&ctx.cart, &mut out),
    }
}
