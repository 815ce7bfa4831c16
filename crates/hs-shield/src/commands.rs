//! Command handlers.

use crate::config::ShieldConfig;
use anyhow::{Context, Result, anyhow, bail};
use hs_discovery::InventoryLocator;
use hs_hooks::{InMemoryTarget, InstallReport, ShieldContext, select_groups, spawn_install_pass};
use hs_network::{EventFeed, InterceptResult, RequestDetails, RequestInterceptor};
use hs_rules::rule_file::is_rule_file_name;
use hs_rules::{Rule, RuleId, RuleMatcher, RuleService, RuleStore, RuleType};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CheckKind {
    Dns,
    Http,
    Okhttp,
    Web,
}

fn open_store(config: &ShieldConfig) -> Result<Arc<RuleStore>> {
    let store = RuleStore::open(&config.database)
        .with_context(|| format!("Failed to open rule database {}", config.database.display()))?;
    Ok(Arc::new(store))
}

fn print_rules(rules: &[Rule], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rules)?);
    } else {
        for rule in rules {
            println!("{:>6}  {}", rule.id, rule.to_line());
        }
    }
    Ok(())
}

pub fn list_rules(config: &ShieldConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    print_rules(&store.list_all()?, json)
}

pub fn search_rules(config: &ShieldConfig, text: &str, json: bool) -> Result<()> {
    let store = open_store(config)?;
    print_rules(&store.search(text).current(), json)
}

pub async fn add_rule(config: &ShieldConfig, rule_type: RuleType, value: &str) -> Result<()> {
    let service = RuleService::new(open_store(config)?);
    let id = service.add_rule(rule_type, value).await?;
    println!("Added rule {id}: {}, {}", rule_type, value.trim());
    Ok(())
}

pub async fn remove_rules(config: &ShieldConfig, ids: &[RuleId]) -> Result<()> {
    let service = RuleService::new(open_store(config)?);
    let mut removed = 0;
    for id in ids {
        removed += service.remove_rule(*id).await?;
    }
    println!("Removed {removed} rules");
    Ok(())
}

pub async fn clear_rules(config: &ShieldConfig) -> Result<()> {
    let service = RuleService::new(open_store(config)?);
    let removed = service.clear().await?;
    println!("Removed {removed} rules");
    Ok(())
}

pub async fn import_rules(config: &ShieldConfig, path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_rule_file_name(&name) {
        bail!("Not a rule file (expected *.rule): {}", path.display());
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let service = RuleService::new(open_store(config)?);
    let summary = service.import_from(file).await?;
    println!(
        "Imported {} rules ({} parsed, {} skipped)",
        summary.inserted, summary.parsed, summary.skipped
    );
    Ok(())
}

pub async fn export_rules(config: &ShieldConfig, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let service = RuleService::new(open_store(config)?);
    let written = service.export_to(file).await?;
    println!("Exported {written} rules to {}", path.display());
    Ok(())
}

/// Run one request through the interceptor and print the decision and events
pub fn check(config: &ShieldConfig, target: &str, kind: CheckKind, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let (feed, events) = EventFeed::new(config.host_package.clone(), 4);
    let interceptor = RequestInterceptor::new(RuleMatcher::new(store.snapshots()), config.interceptor())
        .with_event_feed(feed);

    let details = RequestDetails::http("GET", target);
    let result = match kind {
        CheckKind::Dns => interceptor.check_dns(target, &[]),
        CheckKind::Http => interceptor.check_http(target, &details),
        CheckKind::Okhttp => interceptor.check_okhttp(target, &details),
        CheckKind::Web => interceptor.check_web(target, &details),
    };

    if json {
        for event in events.try_iter() {
            println!("{}", serde_json::to_string(&event)?);
        }
    } else {
        match result {
            InterceptResult::Blocked { rule } => println!("BLOCK  {target}  ({})", rule.to_line()),
            InterceptResult::Allow => println!("PASS   {target}"),
        }
    }
    Ok(())
}

/// Discovery + install pass against a method inventory
pub fn install(config: &ShieldConfig, inventory: Option<&Path>, json: bool) -> Result<()> {
    let inventory = inventory
        .or(config.inventory.as_deref())
        .ok_or_else(|| anyhow!("No method inventory given (use --inventory or set `inventory`)"))?;
    let locator = InventoryLocator::from_path(inventory)
        .with_context(|| format!("Failed to load inventory {}", inventory.display()))?;

    let target = Arc::new(InMemoryTarget::new());
    let ctx = Arc::new(ShieldContext::open(
        config.host_package.clone(),
        Box::new(locator),
        target.clone(),
    ));
    let groups = select_groups(&config.enabled_groups, config.suppress_original);

    let handle = spawn_install_pass(Arc::clone(&ctx), groups).context("Failed to spawn install worker")?;
    let report = handle
        .join()
        .map_err(|_| anyhow!("Install worker could not be joined"))?
        .ok_or_else(|| anyhow!("Install pass panicked"))?;
    ctx.close();

    info!("{} intercepts recorded", target.installed_count());
    print_report(&report, json)
}

fn print_report(report: &InstallReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for group in &report.groups {
        println!(
            "{:<16} discovered {:>4}  installed {:>4}  failed {:>4}",
            group.group,
            group.discovered,
            group.installed(),
            group.failed()
        );
        for record in &group.records {
            println!("    {}  {}  {:?}", record.method, record.action, record.outcome);
        }
    }
    println!("Total: {} installed, {} failed", report.installed(), report.failed());
    Ok(())
}
