use anyhow::{Context, bail};
use clap::Args;
use scanreturn_core::{
    ActivationRequest, DashboardStats, ScanReturnContext, Suggestions, TagView, batch_scan_urls,
    tag_id_from_scan,
};
use serde_json::{Value, json};

use crate::render::{outcome_json, print_value, record_json, view_json};

#[derive(Args)]
pub struct ScanArgs {
    /// Scanned link (`...?tag=<id>`) or a bare tag id
    pub input: String,
    /// Bind the tag when it turns out to be unactivated
    #[arg(long, requires_all = ["item", "phone"])]
    pub activate: bool,
    #[arg(long)]
    pub item: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub tag_id: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ActivateArgs {
    pub tag_id: String,
    #[arg(long)]
    pub item: String,
    #[arg(long)]
    pub phone: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct LinksArgs {
    /// Base URL the printed tags point at
    #[arg(long)]
    pub base: String,
    #[arg(long, default_value_t = 1)]
    pub start: u32,
    #[arg(long, default_value_t = 10)]
    pub count: u32,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run_scan(context: &ScanReturnContext, args: ScanArgs) -> anyhow::Result<()> {
    let messaging = context.cache().messaging();
    let suggestions = Suggestions::template_only();
    let Some(tag_id) = tag_id_from_scan(&args.input) else {
        // No tag selected: the landing view is the dashboard.
        return run_list(context, &ListArgs { json: args.json });
    };

    let mut transcript = Vec::new();
    let mut session = context.session();
    let view = session.open(&tag_id).await?.clone();
    transcript.push(view_json(&view, messaging, &suggestions).await);

    let skipped = activation_skip_reason(&view).filter(|_| args.activate);
    if let Some(reason) = skipped {
        tracing::warn!(tag_id = tag_id.as_str(), reason, "Ignoring --activate");
    } else if args.activate {
        let item = args.item.as_deref().unwrap_or_default();
        let phone = args.phone.as_deref().unwrap_or_default();
        let submitted = session.submit_activation(item, phone).await?.clone();
        transcript.push(view_json(&submitted, messaging, &suggestions).await);
        if matches!(submitted, TagView::ActivationSubmitted { .. }) {
            let confirmed = session.confirm_activation().await?.clone();
            transcript.push(view_json(&confirmed, messaging, &suggestions).await);
        }
    }

    if args.json {
        print_value(&Value::Array(transcript), true)?;
    } else {
        for (index, step) in transcript.iter().enumerate() {
            if index > 0 {
                println!();
            }
            print_value(step, false)?;
        }
    }

    match session.view() {
        TagView::Error { message, .. } => bail!("{message}"),
        TagView::Activating {
            last_error: Some(message),
            ..
        } => bail!("{message}"),
        _ => Ok(()),
    }
}

/// Why `--activate` cannot apply to the view the scan resolved to.
fn activation_skip_reason(view: &TagView) -> Option<&'static str> {
    match view {
        TagView::Activating { .. } => None,
        TagView::Found { .. } => Some("tag is already bound to an item"),
        _ => Some("tag did not resolve"),
    }
}

pub async fn run_resolve(context: &ScanReturnContext, args: &ResolveArgs) -> anyhow::Result<()> {
    let endpoint = context.endpoint();
    let resolution = context
        .resolution()
        .resolve(args.tag_id.trim(), endpoint.remote().as_ref())
        .await
        .context("resolution failed; return home and scan again")?;

    let mut value = record_json(
        &resolution.record,
        context.cache().messaging(),
        &Suggestions::template_only(),
    )
    .await;
    value["source"] = json!(resolution.source.as_str());
    print_value(&value, args.json)
}

pub async fn run_activate(context: &ScanReturnContext, args: &ActivateArgs) -> anyhow::Result<()> {
    let endpoint = context.endpoint();
    let request = ActivationRequest::new(
        args.tag_id.as_str(),
        args.item.as_str(),
        args.phone.as_str(),
    );
    let outcome = context
        .activation()
        .activate(&request, endpoint.remote().as_ref())
        .await?;

    let mut value = outcome_json(&outcome);
    if let Some(record) = outcome.record() {
        value["record"] = record_json(
            record,
            context.cache().messaging(),
            &Suggestions::template_only(),
        )
        .await;
    }
    print_value(&value, args.json)?;
    if !outcome.succeeded() {
        bail!("activation failed, check your connection");
    }
    Ok(())
}

pub fn run_list(context: &ScanReturnContext, args: &ListArgs) -> anyhow::Result<()> {
    let records = context.cache().list();
    let stats = DashboardStats::from_records(&records);

    if args.json {
        let tags = records
            .iter()
            .map(|record| {
                json!({
                    "tag_id": record.tag_id(),
                    "status": record.status().as_str(),
                    "item_name": record.item_name(),
                })
            })
            .collect::<Vec<_>>();
        return print_value(&json!({ "stats": stats, "tags": tags }), true);
    }

    println!(
        "Tags: {} total, {} active, {} unbound",
        stats.total, stats.active, stats.unbound
    );
    for record in &records {
        match record.item_name() {
            Some(item_name) => println!(
                "  {:<10} {:<7} {item_name}",
                record.tag_id(),
                record.status().as_str()
            ),
            None => println!("  {:<10} {}", record.tag_id(), record.status().as_str()),
        }
    }
    Ok(())
}

pub fn run_links(args: &LinksArgs) -> anyhow::Result<()> {
    let links = batch_scan_urls(&args.base, args.start, args.count);
    if args.json {
        let links = links
            .iter()
            .map(|(tag_id, url)| json!({ "tag_id": tag_id, "url": url }))
            .collect::<Vec<_>>();
        return print_value(&Value::Array(links), true);
    }
    for (tag_id, url) in &links {
        println!("{tag_id}\t{url}");
    }
    Ok(())
}
