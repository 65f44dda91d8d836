//! Line-oriented session. Plain lines feed the query coordinator as if typed;
//! `:`-prefixed lines change criteria or curate the wishlist and cart.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use shelf_api::InMemoryCatalog;
use shelf_core::ItemId;
use shelf_query::{QueryConfig, QueryCoordinator, QueryView, SearchStatus};
use shelf_search::{CriteriaChange, FilterCriteria};
use shelf_store::{CollectionKind, Shelves};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{print_items, render_row, Output};

const HELP: &str = "\
<text>                    set the query text (empty line clears)
:price all|MIN-MAX|MIN-   price range
:rating all|N             minimum rating
:category NAME            all, react, python, design, backend, frontend
:sort KEY                 name, price-low, price-high, rating
:wish add|rm|toggle ID    curate the wishlist
:cart add|rm ID           curate the cart
:clear wish|cart          empty a collection
:show                     print wishlist and cart
:quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectionOp {
    Add(ItemId),
    Remove(ItemId),
    Toggle(ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShellCommand {
    Query(String),
    Criteria(CriteriaChange),
    Collection(CollectionKind, CollectionOp),
    Clear(CollectionKind),
    Show,
    Help,
    Quit,
}

fn parse_kind(s: &str) -> Result<CollectionKind> {
    match s {
        "wish" | "wishlist" => Ok(CollectionKind::Wishlist),
        "cart" => Ok(CollectionKind::Cart),
        other => bail!("unknown collection: {other}"),
    }
}

fn parse_id(s: Option<&str>) -> Result<ItemId> {
    let s = s.ok_or_else(|| anyhow!("missing item id"))?;
    s.parse().map_err(|_| anyhow!("invalid item id: {s}"))
}

pub(crate) fn parse_line(line: &str) -> Result<ShellCommand> {
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(ShellCommand::Query(line.to_string()));
    };
    let mut parts = rest.split_whitespace();
    let head = parts.next().unwrap_or("");
    let arg = parts.next();
    let cmd = match head {
        "price" => ShellCommand::Criteria(CriteriaChange::PriceRange(arg.unwrap_or("all").parse()?)),
        "rating" => ShellCommand::Criteria(CriteriaChange::MinRating(arg.unwrap_or("all").parse()?)),
        "category" => ShellCommand::Criteria(CriteriaChange::Category(arg.unwrap_or("all").parse()?)),
        "sort" => ShellCommand::Criteria(CriteriaChange::SortKey(arg.unwrap_or("name").parse()?)),
        "wish" | "cart" => {
            let kind = parse_kind(head)?;
            let id = parse_id(parts.next())?;
            let op = match arg {
                Some("add") => CollectionOp::Add(id),
                Some("rm") | Some("remove") => CollectionOp::Remove(id),
                Some("toggle") if kind == CollectionKind::Wishlist => CollectionOp::Toggle(id),
                Some(other) => bail!("unknown {head} action: {other}"),
                None => bail!("missing {head} action"),
            };
            ShellCommand::Collection(kind, op)
        }
        "clear" => ShellCommand::Clear(parse_kind(arg.ok_or_else(|| anyhow!("clear what? wish|cart"))?)?),
        "show" => ShellCommand::Show,
        "help" => ShellCommand::Help,
        "quit" | "q" => ShellCommand::Quit,
        other => bail!("unknown command :{other} (try :help)"),
    };
    Ok(cmd)
}

pub(crate) async fn run(catalog: Arc<InMemoryCatalog>, output: Output) -> Result<()> {
    let shelves = Shelves::new();
    let coord = QueryCoordinator::activate(catalog.clone(), QueryConfig::from_env());
    let printer = tokio::spawn(print_views(coord.subscribe(), output));
    info!(items = catalog.items().len(), "shell ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let cmd = match parse_line(line.trim_end_matches('\r')) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        debug!(?cmd, "shell command");
        match cmd {
            ShellCommand::Query(text) => coord.set_query_text(text).await?,
            ShellCommand::Criteria(change) => coord.change_criteria(change).await?,
            ShellCommand::Collection(kind, op) => apply_op(&shelves, &catalog, kind, op),
            ShellCommand::Clear(kind) => {
                shelves.get(kind).clear();
                println!("{kind} cleared");
            }
            ShellCommand::Show => show(&shelves, output)?,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
        }
    }

    coord.deactivate().await;
    let _ = printer.await;
    Ok(())
}

fn apply_op(shelves: &Shelves, catalog: &InMemoryCatalog, kind: CollectionKind, op: CollectionOp) {
    let id = match op {
        CollectionOp::Add(id) | CollectionOp::Remove(id) | CollectionOp::Toggle(id) => id,
    };
    let handle = shelves.get(kind);
    if let CollectionOp::Remove(id) = op {
        if !handle.remove(id) {
            println!("{id} was not in the {kind}");
        }
        return;
    }
    let Some(item) = catalog.get(id).cloned() else {
        eprintln!("error: no catalog item {id}");
        return;
    };
    let name = item.name.clone();
    match (kind, op) {
        (CollectionKind::Wishlist, CollectionOp::Toggle(_)) => {
            let member = shelves.toggle_wishlist(item);
            println!("{name} {} wishlist", if member { "added to" } else { "removed from" });
        }
        (CollectionKind::Cart, _) => match shelves.add_to_cart(item) {
            Ok(true) => println!("{name} added to cart"),
            Ok(false) => println!("{name} already in cart"),
            Err(e) => eprintln!("error: {e}"),
        },
        (CollectionKind::Wishlist, _) => {
            if handle.add(item) {
                println!("{name} added to wishlist");
            } else {
                println!("{name} already in wishlist");
            }
        }
    }
}

fn show(shelves: &Shelves, output: Output) -> Result<()> {
    for kind in [CollectionKind::Wishlist, CollectionKind::Cart] {
        let summary = shelves.summary(kind);
        let state = shelves.get(kind).current();
        match output {
            Output::Human => {
                println!("{kind}: {} item{}, total ${:.2}", summary.count, if summary.count == 1 { "" } else { "s" }, summary.total_value);
                for it in state.iter() {
                    println!("{}", render_row(it));
                }
            }
            Output::Json => {
                #[derive(serde::Serialize)]
                struct Dump<'a> { summary: shelf_store::CollectionSummary, entries: &'a [shelf_store::CollectionEntry] }
                println!("{}", serde_json::to_string_pretty(&Dump { summary, entries: state.entries() })?);
            }
        }
    }
    Ok(())
}

/// Prints each settled view once. Stops when the coordinator goes away.
async fn print_views(mut rx: watch::Receiver<QueryView>, output: Output) {
    let mut last: Option<(u64, String, FilterCriteria, Option<String>)> = None;
    while rx.changed().await.is_ok() {
        let v = rx.borrow_and_update().clone();
        if !v.active {
            break;
        }
        if !v.is_settled() {
            continue;
        }
        let key = (v.sequence, v.raw_text.clone(), v.criteria, v.failure.clone());
        if last.as_ref() == Some(&key) {
            continue;
        }
        last = Some(key);
        if let Some(err) = &v.failure {
            eprintln!("search failed: {err}");
            continue;
        }
        let printed = match (output, v.status()) {
            (Output::Json, _) => serde_json::to_string_pretty(&v).map(|s| println!("{s}")).map_err(anyhow::Error::from),
            (Output::Human, SearchStatus::Idle) => {
                println!("start typing to search");
                Ok(())
            }
            (Output::Human, SearchStatus::Empty) => {
                println!("no books found");
                Ok(())
            }
            (Output::Human, _) => print_items(output, &v.visible, None),
        };
        if let Err(e) = printed {
            eprintln!("error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_search::{Category, MinRating, PriceRange, SortKey};

    #[test]
    fn plain_lines_are_queries() {
        assert_eq!(parse_line("react hooks").unwrap(), ShellCommand::Query("react hooks".into()));
        assert_eq!(parse_line("").unwrap(), ShellCommand::Query(String::new()));
    }

    #[test]
    fn criteria_commands_parse() {
        assert_eq!(
            parse_line(":price 20-50").unwrap(),
            ShellCommand::Criteria(CriteriaChange::PriceRange(PriceRange::Between { min: 20.0, max: 50.0 }))
        );
        assert_eq!(parse_line(":rating 4").unwrap(), ShellCommand::Criteria(CriteriaChange::MinRating(MinRating::AtLeast(4))));
        assert_eq!(parse_line(":category design").unwrap(), ShellCommand::Criteria(CriteriaChange::Category(Category::Design)));
        assert_eq!(parse_line(":sort").unwrap(), ShellCommand::Criteria(CriteriaChange::SortKey(SortKey::Name)));
        assert!(parse_line(":rating 9").is_err());
    }

    #[test]
    fn collection_commands_parse() {
        assert_eq!(
            parse_line(":wish toggle 7").unwrap(),
            ShellCommand::Collection(CollectionKind::Wishlist, CollectionOp::Toggle(7))
        );
        assert_eq!(parse_line(":cart rm 3").unwrap(), ShellCommand::Collection(CollectionKind::Cart, CollectionOp::Remove(3)));
        assert_eq!(parse_line(":clear cart").unwrap(), ShellCommand::Clear(CollectionKind::Cart));
        assert!(parse_line(":cart toggle 3").is_err());
        assert!(parse_line(":wish add").is_err());
        assert!(parse_line(":wish add x").is_err());
        assert!(parse_line(":bogus").is_err());
    }

    #[test]
    fn apply_op_respects_stock_and_membership() {
        let catalog = InMemoryCatalog::from_json_str(
            r#"[{"id":1,"name":"In","price":10},{"id":2,"name":"Out","price":5,"in_stock":false}]"#,
        )
        .unwrap();
        let shelves = Shelves::new();
        apply_op(&shelves, &catalog, CollectionKind::Cart, CollectionOp::Add(1));
        apply_op(&shelves, &catalog, CollectionKind::Cart, CollectionOp::Add(2));
        apply_op(&shelves, &catalog, CollectionKind::Cart, CollectionOp::Add(99));
        assert_eq!(shelves.cart.current().ids(), vec![1]);
        apply_op(&shelves, &catalog, CollectionKind::Wishlist, CollectionOp::Toggle(2));
        assert!(shelves.wishlist.contains(2));
        apply_op(&shelves, &catalog, CollectionKind::Wishlist, CollectionOp::Toggle(2));
        assert!(!shelves.wishlist.contains(2));
    }
}
