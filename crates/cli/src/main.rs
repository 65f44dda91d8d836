use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shelf_api::InMemoryCatalog;
use shelf_core::CatalogItem;
use shelf_query::{QueryConfig, QueryCoordinator};
use shelf_search::{Category, FilterCriteria, FilterDebugInfo, MinRating, PriceRange, SortKey};
use tracing::info;

mod shell;

#[derive(Parser, Debug)]
#[command(name = "shelfctl", version, about = "Shelf CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Catalog JSON file (array of items)
    #[arg(long = "catalog", global = true, env = "SHELF_CATALOG", default_value = "data/catalog.json")]
    catalog: String,

    /// Simulated catalog latency in milliseconds
    #[arg(long = "latency-ms", global = true, default_value_t = 0)]
    latency_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Output { Human, Json }

#[derive(clap::Args, Debug, Clone)]
struct FilterArgs {
    /// Price range: all, MIN-MAX or MIN- (e.g. 0-20, 100-)
    #[arg(long = "price", default_value = "all")]
    price: PriceRange,
    /// Minimum rating: all or 0..5
    #[arg(long = "rating", default_value = "all")]
    rating: MinRating,
    /// Category: all, react, python, design, backend, frontend
    #[arg(long = "category", default_value = "all")]
    category: Category,
    /// Sort: name, price-low, price-high, rating
    #[arg(long = "sort", default_value = "name")]
    sort: SortKey,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria { price_range: self.price, min_rating: self.rating, category: self.category, sort_key: self.sort }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one debounced lookup and print the filtered results
    Search {
        /// Query text
        query: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// Explain filter stages and counts
        #[arg(long = "explain")]
        explain: bool,
    },
    /// List the whole catalog through the filter pipeline
    Ls {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Interactive session: type queries, `:help` for commands
    Shell,
}

fn init_tracing() {
    let env = std::env::var("SHELF_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("SHELF_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid SHELF_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let catalog = InMemoryCatalog::load(&cli.catalog)
        .with_context(|| format!("loading catalog from {}", cli.catalog))?
        .with_latency(Duration::from_millis(cli.latency_ms));
    let catalog = Arc::new(catalog);

    match cli.command {
        Commands::Search { query, filters, explain } => {
            info!(query = %query, "search invoked");
            let coord = QueryCoordinator::activate(catalog.clone(), QueryConfig::from_env());
            coord.set_criteria(filters.criteria()).await?;
            coord.set_query_text(query.clone()).await?;
            let view = coord.wait_settled().await?;
            coord.deactivate().await;
            if let Some(err) = &view.failure {
                eprintln!("search failed: {}", err);
            }
            let (_, dbg) = shelf_search::apply_filters_with_debug(&view.results, &view.criteria);
            print_items(cli.output, &view.visible, explain.then_some(&dbg))?;
        }
        Commands::Ls { filters } => {
            let criteria = filters.criteria();
            info!(price = %criteria.price_range, rating = %criteria.min_rating, category = %criteria.category, sort = %criteria.sort_key, "ls invoked");
            let items = shelf_search::apply_filters(catalog.items(), &criteria);
            print_items(cli.output, &items, None)?;
        }
        Commands::Shell => {
            shell::run(catalog, cli.output).await?;
        }
    }

    Ok(())
}

pub(crate) fn print_items(output: Output, items: &[CatalogItem], explain: Option<&FilterDebugInfo>) -> Result<()> {
    match output {
        Output::Human => {
            println!("{:>6}  {:<40} {:>8}  {:<5}  STOCK", "ID", "NAME", "PRICE", "RATE");
            for it in items {
                println!("{}", render_row(it));
            }
            println!("found {} result{}", items.len(), if items.len() == 1 { "" } else { "s" });
            if let Some(dbg) = explain {
                eprintln!(
                    "debug: total={} after_price={} after_rating={} after_category={}",
                    dbg.total, dbg.after_price, dbg.after_rating, dbg.after_category
                );
            }
        }
        Output::Json => {
            if let Some(dbg) = explain {
                #[derive(serde::Serialize)]
                struct Explain<'a> { items: &'a [CatalogItem], debug: &'a FilterDebugInfo }
                println!("{}", serde_json::to_string_pretty(&Explain { items, debug: dbg })?);
            } else {
                println!("{}", serde_json::to_string_pretty(items)?);
            }
        }
    }
    Ok(())
}

pub(crate) fn render_row(it: &CatalogItem) -> String {
    let stars: String = (0..shelf_core::MAX_RATING).map(|i| if i < it.rating { '*' } else { '.' }).collect();
    let mut price = format!("${:.2}", it.price);
    if let Some(orig) = it.original_price.filter(|_| it.discount().is_some()) {
        price = format!("{} (was ${:.2})", price, orig);
    }
    let stock = if it.in_stock { "in" } else { "out" };
    let badge = if it.best_seller { " [best seller]" } else { "" };
    format!("{:>6}  {:<40} {:>8}  {:<5}  {}{}", it.id, truncate(&it.name, 40), price, stars, stock, badge)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
