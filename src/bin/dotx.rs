// Headless command line front end: resolve identifiers, inspect blocks,
// extrinsics and accounts, or follow the chain head.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use dotx::api::ExplorerApi;
use dotx::block_number::BlockNumber;
use dotx::config::{self, CliArgs, Command, Config};
use dotx::feed::{RecentBlocksFeed, RecentEventsFeed, RecentExtrinsicsFeed};
use dotx::pagination::{PanelState, ResourceItems, ResourceKind, ResourcePanel};
use dotx::poll::PollingScheduler;
use dotx::range::{RangeTracker, SharedRange};
use dotx::resolver::{IdentifierResolver, ResolutionTarget};
use dotx::types::{Block, BlockSearch, Extrinsic};
use dotx::util_text::{format_balance, format_time_ago, format_timestamp, short_hash};
use dotx::view::{self, AccountLookup, AccountView, BlockView, BlockViewState, ExtrinsicView, ExtrinsicViewState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    let cfg = config::load(&args)?;
    if log::log_enabled!(log::Level::Debug) {
        cfg.print_summary();
    }

    let api: Arc<dyn ExplorerApi> = Arc::new(cfg.http_api());
    let range = SharedRange::new(RangeTracker::new(cfg.block_time_secs));

    match args.command {
        Command::Resolve { query } => resolve(&cfg, api, &range, &query).await,
        Command::Block { number, page } => {
            let number = BlockNumber::parse(number.trim())?;
            show_block(&cfg, api, range, number, page).await
        }
        Command::Extrinsic { index } => show_extrinsic(&cfg, api, &index).await,
        Command::Search {
            number,
            hash,
            author,
            finalized,
        } => {
            let query = BlockSearch {
                number: number.as_deref().map(BlockNumber::parse).transpose()?,
                hash,
                author,
                finalized_only: finalized,
            };
            search(api.as_ref(), &range, &query).await
        }
        Command::Account { id } => show_account(api, &id).await,
        Command::Watch => watch(&cfg, api, range).await,
    }
}

async fn resolve(cfg: &Config, api: Arc<dyn ExplorerApi>, range: &SharedRange, query: &str) -> Result<()> {
    let resolver = IdentifierResolver::new(api.clone());
    match resolver.resolve(query).await {
        ResolutionTarget::BlockByNumber(n) => {
            println!("block {n}");
            show_block(cfg, api, range.clone(), n, 1).await
        }
        ResolutionTarget::BlockByHash { hash, number } => {
            println!("block {number} (hash {})", short_hash(&hash));
            show_block(cfg, api, range.clone(), number, 1).await
        }
        ResolutionTarget::ExtrinsicByIndex(idx) => {
            println!("extrinsic {idx}");
            show_extrinsic(cfg, api, &idx.to_string()).await
        }
        ResolutionTarget::FreeTextSearch(text) => {
            println!("searching blocks for '{text}'");
            search(api.as_ref(), range, &BlockSearch::from_free_text(&text)).await
        }
        ResolutionTarget::NotFound(msg) => Err(anyhow!(msg)),
    }
}

/// Seed the range from the recent-blocks list so classification has bounds.
async fn seed_range(cfg: &Config, api: Arc<dyn ExplorerApi>, range: &SharedRange) {
    let feed = RecentBlocksFeed::new(api, range.clone(), cfg.recent_limit);
    if let Err(e) = feed.refresh().await {
        log::warn!("⚠️ Could not load recent blocks, range unknown: {e}");
    }
}

async fn show_block(
    cfg: &Config,
    api: Arc<dyn ExplorerApi>,
    range: SharedRange,
    number: BlockNumber,
    page: u32,
) -> Result<()> {
    seed_range(cfg, api.clone(), &range).await;

    let mut view = BlockView::new(api, range, cfg.page_size);
    view.open(number.clone()).await;
    if page > 1 {
        for kind in [ResourceKind::Extrinsics, ResourceKind::Events] {
            if let Err(e) = view.load_page(kind, page).await {
                println!("{kind}: {e}");
            }
        }
    }

    match view.state() {
        BlockViewState::Loaded(block) => print_block(block),
        BlockViewState::Future { latest, eta } => {
            println!("Block #{number} has not been produced yet (latest indexed: #{latest}).");
            if let Some(eta) = eta {
                println!("Estimated arrival: {}", eta.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            return Ok(());
        }
        BlockViewState::Stale { oldest } => {
            println!("Block #{number} has not been indexed yet. The oldest indexed block is #{oldest}.");
            return Ok(());
        }
        BlockViewState::Failed(e) => println!("Block #{number}: {e}"),
        BlockViewState::Empty => {}
    }

    let panels = view.panels();
    print_panel(&panels.extrinsics);
    print_panel(&panels.events);
    print_panel(&panels.logs);
    Ok(())
}

async fn show_extrinsic(cfg: &Config, api: Arc<dyn ExplorerApi>, index: &str) -> Result<()> {
    let mut view = ExtrinsicView::new(api, cfg.page_size);
    match view.open_str(index).await? {
        ExtrinsicViewState::Loaded(ex) => print_extrinsic(ex),
        ExtrinsicViewState::Failed(e) => return Err(anyhow!("{e}")),
        ExtrinsicViewState::Empty => {}
    }
    print_panel(view.events());
    Ok(())
}

async fn search(api: &dyn ExplorerApi, range: &SharedRange, query: &BlockSearch) -> Result<()> {
    let blocks = view::search_blocks(api, range, query)
        .await
        .context("block search failed")?;
    if blocks.is_empty() {
        println!("No blocks matched.");
    }
    let now = Utc::now();
    for b in &blocks {
        println!(
            "#{:<12} {}  {:<10} {}{}",
            b.number,
            short_hash(&b.hash),
            format_time_ago(b.timestamp, now),
            short_hash(&b.author_id),
            if b.finalized { "  finalized" } else { "" }
        );
    }
    Ok(())
}

async fn show_account(api: Arc<dyn ExplorerApi>, id: &str) -> Result<()> {
    match AccountView::new(api).lookup(id).await? {
        AccountLookup::NoBalances(account) => println!("No balances found for {account}."),
        AccountLookup::Balances(account) => {
            println!("Account {}", account.account_id);
            for b in &account.balances {
                let amount = match b.decimals {
                    Some(d) => format_balance(&b.balance, d),
                    None => b.balance.clone(),
                };
                println!(
                    "  {:<10} {:>30}  (asset {})",
                    b.symbol.as_deref().unwrap_or("-"),
                    amount,
                    b.asset_id
                );
            }
        }
    }
    Ok(())
}

async fn watch(cfg: &Config, api: Arc<dyn ExplorerApi>, range: SharedRange) -> Result<()> {
    let scheduler = PollingScheduler::new();
    let blocks = RecentBlocksFeed::new(api.clone(), range, cfg.recent_limit);
    let extrinsics = RecentExtrinsicsFeed::new(api, cfg.recent_limit);

    log::info!("🚀 Watching {} every {}ms", cfg.api_url, cfg.poll_interval_ms);

    let watcher = blocks.clone();
    let block_handle = scheduler.start("watch", cfg.poll_interval(), move || {
        let feed = watcher.clone();
        async move {
            let update = feed.refresh().await.context("refreshing recent blocks")?;
            if update.changed() {
                let s = feed.range().snapshot();
                let show = |n: &Option<BlockNumber>| n.as_ref().map_or("?".to_string(), |n| n.to_string());
                println!(
                    "indexed range #{} .. #{}",
                    show(&s.oldest_known),
                    show(&s.latest_known)
                );
                if let Some(head) = feed.latest() {
                    print_block_line(&head);
                }
            }
            Ok(())
        }
    });
    let extrinsic_handle = extrinsics.spawn_polling(&scheduler, cfg.poll_interval());
    let head_events = RecentEventsFeed::new(blocks.clone(), cfg.page_size);
    let events_handle = head_events.spawn_polling(&scheduler, cfg.poll_interval());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    block_handle.cancel();
    extrinsic_handle.cancel();
    events_handle.cancel();

    let status = block_handle.status();
    log::info!(
        "👋 Stopped after {} ticks ({} failed), {} recent extrinsics cached",
        status.ticks,
        status.failures,
        extrinsics.extrinsics().len()
    );
    if let Some(err) = status.last_error {
        log::warn!("last error: {err}");
    }
    if let (Some(head), PanelState::Loaded(page)) = (head_events.head(), head_events.state()) {
        log::info!("head #{head} emitted {} events", page.total);
    }
    Ok(())
}

fn print_block_line(b: &Block) {
    println!(
        "  #{} {} {} ext={} ev={}",
        b.number,
        short_hash(&b.hash),
        format_time_ago(b.timestamp, Utc::now()),
        b.extrinsics_count,
        b.events_count
    );
}

fn print_block(b: &Block) {
    println!("Block #{}", b.number);
    println!("  Hash:            {}", b.hash);
    println!("  Parent:          {}", b.parent_hash);
    println!("  State root:      {}", b.state_root);
    println!("  Extrinsics root: {}", b.extrinsics_root);
    println!(
        "  Time:            {} ({})",
        format_timestamp(b.timestamp),
        format_time_ago(b.timestamp, Utc::now())
    );
    println!("  Author:          {}", b.author_id);
    println!("  Finalized:       {}", b.finalized);
}

fn print_extrinsic(x: &Extrinsic) {
    println!("Extrinsic {}", x.index);
    println!("  Call:     {}", x.method);
    println!("  Signer:   {}", x.signer.as_deref().unwrap_or("unsigned"));
    println!("  Success:  {}", x.success);
    println!("  Pays fee: {}", x.pays_fee);
    println!("  Hash:     {}", x.hash.as_deref().unwrap_or("-"));
    if let Some(nonce) = &x.nonce {
        println!("  Nonce:    {nonce}");
    }
    if let Some(tip) = &x.tip {
        println!("  Tip:      {tip}");
    }
    if !x.args.is_null() {
        println!("  Args:     {}", x.args);
    }
}

fn print_panel(panel: &ResourcePanel) {
    let ps = panel.page_state();
    match panel.state() {
        PanelState::Loaded(page) => {
            if panel.kind().is_paginated() {
                println!(
                    "\n{} ({} total, page {}/{})",
                    panel.kind(),
                    page.total,
                    ps.page,
                    page.total_pages.max(1)
                );
            } else {
                println!("\n{} ({})", panel.kind(), page.total);
            }
            match &page.items {
                ResourceItems::Extrinsics(xs) => {
                    for x in xs {
                        println!(
                            "  {:<14} {:<40} {}",
                            x.index.to_string(),
                            x.method.to_string(),
                            if x.success { "ok" } else { "failed" }
                        );
                    }
                }
                ResourceItems::Events(evs) => {
                    for e in evs {
                        println!(
                            "  {}.{:<32} {:<12} {}",
                            e.pallet,
                            e.method,
                            e.source.as_str(),
                            e.extrinsic_index.as_deref().unwrap_or("")
                        );
                    }
                }
                ResourceItems::Logs(logs) => {
                    for l in logs {
                        println!("  {:<4} {:<16} {}", l.index, l.kind, l.value);
                    }
                }
            }
        }
        PanelState::Failed(e) => println!("\n{}: {e}", panel.kind()),
        PanelState::Idle | PanelState::Loading => {}
    }
}
