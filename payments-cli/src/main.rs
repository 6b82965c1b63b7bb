//! Payments CLI
//!
//! Command-line interface for the storefront payments API.

use anyhow::Result;
use clap::{Parser, Subcommand};

use payments_client::PaymentsClient;
use payments_types::{
    CreateOrderRequest, CreatePaymentRequest, CreateProductRequest, GatewayNotification,
    OrderId, OrderItemRequest, OrderStatus, ProductId, ServerKey,
};

#[derive(Parser)]
#[command(name = "payments")]
#[command(author, version, about = "Storefront payments API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the storefront API
    #[arg(
        long,
        env = "PAYMENTS_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog operations
    Product {
        #[command(subcommand)]
        action: ProductCommands,
    },
    /// Order operations
    Order {
        #[command(subcommand)]
        action: OrderCommands,
    },
    /// Payment operations
    Payment {
        #[command(subcommand)]
        action: PaymentCommands,
    },
    /// Currency lookups
    Currency {
        #[command(subcommand)]
        action: CurrencyCommands,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Add a product to the catalog
    Create {
        name: String,
        /// Unit price, e.g. 100.00
        #[arg(long)]
        price: String,
        #[arg(long, default_value_t = 0)]
        stock: i32,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        /// Create the product hidden from the catalog
        #[arg(long)]
        inactive: bool,
    },
    /// Get product details
    Get { id: String },
    /// List active products
    List,
    /// Search products by name
    Search { query: String },
    /// List products in a category
    Category { category: String },
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Place an order
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        /// Display currency (defaults to IDR)
        #[arg(long)]
        currency: Option<String>,
        /// Line items as PRODUCT_ID:QUANTITY (repeatable)
        #[arg(long = "item", required = true, value_parser = parse_item)]
        items: Vec<OrderItemRequest>,
    },
    /// Get order details
    Get { id: String },
    /// Cancel an order
    Cancel { id: String },
    /// Move an order to a new status
    SetStatus { id: String, status: String },
    /// List a customer's orders
    Customer { email: String },
    /// List orders in a status
    ByStatus { status: String },
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Open a gateway checkout for an order
    Create {
        order_id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Show the payment for an order
    Get { order_id: String },
    /// Send a signed gateway notification (sandbox testing)
    Notify {
        /// Gateway order id returned by `payment create`
        gateway_order_id: String,
        /// Gateway transaction status (settlement, pending, deny, expire, ...)
        #[arg(long, default_value = "settlement")]
        status: String,
        /// Gross amount exactly as the gateway would send it, e.g. 1600000.00
        #[arg(long)]
        gross_amount: String,
        #[arg(long, default_value = "200")]
        status_code: String,
        #[arg(long, default_value = "bank_transfer")]
        payment_type: String,
        #[arg(long)]
        status_message: Option<String>,
        /// Server key used to sign the notification
        #[arg(long, env = "GATEWAY_SERVER_KEY", hide_env_values = true)]
        server_key: String,
    },
}

#[derive(Subcommand)]
enum CurrencyCommands {
    /// List supported currencies
    List,
    /// Default currency for a region
    Region { region: String },
}

fn parse_item(s: &str) -> Result<OrderItemRequest, String> {
    let (product, quantity) = s
        .split_once(':')
        .ok_or_else(|| format!("expected PRODUCT_ID:QUANTITY, got {s}"))?;
    Ok(OrderItemRequest {
        product_id: product
            .trim()
            .parse()
            .map_err(|_| format!("invalid product ID: {product}"))?,
        quantity: quantity
            .trim()
            .parse()
            .map_err(|_| format!("invalid quantity: {quantity}"))?,
    })
}

fn parse_product_id(s: &str) -> Result<ProductId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid product ID: {}", s))
}

fn parse_order_id(s: &str) -> Result<OrderId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid order ID: {}", s))
}

fn parse_status(s: &str) -> Result<OrderStatus> {
    s.parse().map_err(|e| anyhow::anyhow!("{}", e))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = PaymentsClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Product { action } => match action {
            ProductCommands::Create {
                name,
                price,
                stock,
                category,
                description,
                image_url,
                inactive,
            } => {
                let req = CreateProductRequest {
                    name,
                    description,
                    price: price
                        .parse()
                        .map_err(|_| anyhow::anyhow!("Invalid price: {}", price))?,
                    category,
                    image_url,
                    stock_quantity: stock,
                    is_active: !inactive,
                };
                print_json(&client.create_product(&req).await?)?;
            }
            ProductCommands::Get { id } => {
                print_json(&client.get_product(parse_product_id(&id)?).await?)?;
            }
            ProductCommands::List => print_json(&client.list_products().await?)?,
            ProductCommands::Search { query } => {
                print_json(&client.search_products(&query).await?)?;
            }
            ProductCommands::Category { category } => {
                print_json(&client.products_in_category(&category).await?)?;
            }
        },

        Commands::Order { action } => match action {
            OrderCommands::Create {
                name,
                email,
                phone,
                currency,
                items,
            } => {
                let req = CreateOrderRequest {
                    customer_name: name,
                    customer_email: email,
                    customer_phone: phone,
                    currency,
                    items,
                };
                print_json(&client.create_order(&req).await?)?;
            }
            OrderCommands::Get { id } => {
                print_json(&client.get_order(parse_order_id(&id)?).await?)?;
            }
            OrderCommands::Cancel { id } => {
                print_json(&client.cancel_order(parse_order_id(&id)?).await?)?;
            }
            OrderCommands::SetStatus { id, status } => {
                let order = client
                    .update_order_status(parse_order_id(&id)?, parse_status(&status)?)
                    .await?;
                print_json(&order)?;
            }
            OrderCommands::Customer { email } => {
                print_json(&client.orders_for_customer(&email).await?)?;
            }
            OrderCommands::ByStatus { status } => {
                print_json(&client.orders_with_status(parse_status(&status)?).await?)?;
            }
        },

        Commands::Payment { action } => match action {
            PaymentCommands::Create {
                order_id,
                name,
                email,
                phone,
            } => {
                let req = CreatePaymentRequest {
                    order_id: parse_order_id(&order_id)?,
                    customer_name: name,
                    customer_email: email,
                    customer_phone: phone,
                };
                print_json(&client.create_payment(&req).await?)?;
            }
            PaymentCommands::Get { order_id } => {
                print_json(&client.payment_for_order(parse_order_id(&order_id)?).await?)?;
            }
            PaymentCommands::Notify {
                gateway_order_id,
                status,
                gross_amount,
                status_code,
                payment_type,
                status_message,
                server_key,
            } => {
                let mut notification = GatewayNotification {
                    order_id: Some(gateway_order_id),
                    transaction_status: Some(status),
                    status_code: Some(status_code),
                    gross_amount: Some(gross_amount),
                    payment_type: Some(payment_type),
                    status_message,
                    ..Default::default()
                };
                notification.sign(&ServerKey::new(server_key));
                print_json(&client.send_notification(&notification).await?)?;
            }
        },

        Commands::Currency { action } => match action {
            CurrencyCommands::List => print_json(&client.currencies().await?)?,
            CurrencyCommands::Region { region } => {
                print_json(&client.currency_for_region(&region).await?)?;
            }
        },
    }

    Ok(())
}
