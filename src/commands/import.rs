use chrono::NaiveDateTime;
use clap::{Args, Subcommand};
use sqlx::SqlitePool;

use super::common::{parse_since, run_steps, Clients, CommandError, RunArgs};
use crate::clients::{CustomerQuery, OrderQuery, Page};
use crate::config::Config;
use crate::sync::{Step, StepInputs};

/// Pull records from the ERP or the storefront into the local store
#[derive(Debug, Args)]
pub struct ImportCommand {
    #[command(subcommand)]
    target: ImportTarget,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum ImportTarget {
    /// Web categories of the configured company
    Categories,

    /// Products changed in the ERP
    Products {
        /// Only products modified after this date (default: look-back window)
        #[arg(long, value_parser = parse_since)]
        modified_after: Option<NaiveDateTime>,

        /// Page size of the ERP feed
        #[arg(long, default_value = "100000")]
        items: u32,

        #[arg(long, default_value = "0")]
        page: u32,
    },

    /// Stock levels of known products
    Stock,

    /// Storefront customers and their addresses
    Customers(CustomerArgs),

    /// Addresses of storefront customers already in the store
    Addresses(CustomerArgs),

    /// Storefront orders of known customers, with their lines
    Orders(OrderArgs),
}

#[derive(Debug, Args)]
struct CustomerArgs {
    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value = "100")]
    per_page: u32,

    #[arg(long, default_value = "1")]
    page: u32,
}

impl CustomerArgs {
    fn query(&self) -> CustomerQuery {
        CustomerQuery {
            page: Page::new(self.per_page, self.page),
            email: self.email.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Args)]
struct OrderArgs {
    /// e.g. processing, completed
    #[arg(long)]
    status: Option<String>,

    /// ISO 8601 creation lower bound
    #[arg(long)]
    after: Option<String>,

    #[arg(long)]
    before: Option<String>,

    #[arg(long)]
    modified_after: Option<String>,

    #[arg(long)]
    modified_before: Option<String>,

    /// Storefront customer id
    #[arg(long)]
    customer: Option<i64>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    orderby: Option<String>,

    /// asc or desc
    #[arg(long)]
    order: Option<String>,

    /// Comma-separated order ids
    #[arg(long, value_delimiter = ',')]
    include: Vec<i64>,

    #[arg(long, default_value = "100")]
    per_page: u32,

    #[arg(long, default_value = "1")]
    page: u32,
}

impl OrderArgs {
    fn query(&self) -> OrderQuery {
        OrderQuery {
            page: Page::new(self.per_page, self.page),
            status: self.status.clone(),
            after: self.after.clone(),
            before: self.before.clone(),
            modified_after: self.modified_after.clone(),
            modified_before: self.modified_before.clone(),
            customer: self.customer,
            search: self.search.clone(),
            orderby: self.orderby.clone(),
            order: self.order.clone(),
            include: self.include.clone(),
        }
    }
}

impl ImportCommand {
    pub async fn run(&self, pool: SqlitePool, config: &Config) -> Result<(), CommandError> {
        let mut inputs = StepInputs::default();
        let step = match &self.target {
            ImportTarget::Categories => Step::ImportCategories,
            ImportTarget::Products {
                modified_after,
                items,
                page,
            } => {
                inputs.products_modified_after = *modified_after;
                inputs.product_items = *items;
                inputs.product_page = *page;
                Step::ImportProducts
            }
            ImportTarget::Stock => Step::ImportStock,
            ImportTarget::Customers(args) => {
                inputs.customers = args.query();
                Step::ImportCustomers
            }
            ImportTarget::Addresses(args) => {
                inputs.customers = args.query();
                Step::ImportAddresses
            }
            ImportTarget::Orders(args) => {
                inputs.orders = args.query();
                Step::ImportOrders
            }
        };

        let clients = Clients::for_steps(config, &[step])?;
        let engine = clients.engine(pool, config, self.run.options(config), inputs);
        run_steps(&engine, &[step], self.run.dry_run).await
    }
}
