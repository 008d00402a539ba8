//! # space-archive CLI
//!
//! Command-line interface for the space-archive library.

use std::process;
use std::time::Instant;

use chrono::{Local, Offset};
use clap::Parser as ClapParser;
use tracing_subscriber::EnvFilter;

use space_archive::ArchiveError;
use space_archive::anomaly::AnomalyKind;
use space_archive::api::{Client, ReqwestTransport, validate_token};
use space_archive::archive::ArchiveRun;
use space_archive::cli::Args;
use space_archive::progress::stderr_progress;

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("space_archive=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), ArchiveError> {
    let total_start = Instant::now();
    let args = <Args as ClapParser>::parse();
    validate_token(&args.token)?;

    let config = args.to_config();
    config.validate()?;

    // Print header
    println!("📦 space-archive v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if args.rooms.is_empty() {
        println!("🗂️  Scope:     {}", config.scope);
    } else {
        println!("🗂️  Rooms:     {}", args.rooms.len());
    }
    println!("✂️  Max:       {}", config.message_cap);
    println!("📎 Download:  {}", config.download);
    println!("🖼️  Avatars:   {}", config.avatars);
    println!("↕️  Sort:      {}", config.sort);
    if config.extra_output.json() || config.extra_output.text() {
        println!("📄 Extra:     {}", config.extra_output);
    }
    println!("💾 Output:    {}", config.output_dir.display());
    println!();

    let mut client = Client::new(ReqwestTransport::new(args.token.clone())?, &config);
    if !args.quiet {
        client = client.with_progress(stderr_progress());
    }
    let mut archive = ArchiveRun::new(client, config).with_offset(Local::now().offset().fix());
    if !args.quiet {
        archive = archive.with_progress(stderr_progress());
    }

    let summary = if args.rooms.is_empty() {
        archive.run()?
    } else {
        archive.run_rooms(&args.rooms)?
    };

    println!();
    println!("✅ Done! {} conversation(s) archived", summary.conversations.len());

    // Summary
    println!();
    println!("📊 Summary:");
    for report in &summary.conversations {
        let stats = report.stats;
        println!(
            "   {}: {} messages, {} images, {} files, {} authors{}",
            report.title,
            stats.messages,
            stats.images,
            stats.files,
            report.unique_authors,
            if report.truncated { " (truncated)" } else { "" }
        );
        println!("      → {}", report.html.display());
    }
    if !summary.skipped.is_empty() {
        println!("   Skipped:   {}", summary.skipped.len());
        for skipped in &summary.skipped {
            println!(
                "      {}: {}",
                skipped.title.as_deref().unwrap_or(&skipped.room_id),
                skipped.reason
            );
        }
    }
    if summary.rate_limit_hits > 0 {
        println!("   Rate limited: {} time(s)", summary.rate_limit_hits);
    }

    // Anomalies
    if !summary.anomalies.is_empty() {
        println!();
        println!("⚠️  Anomalies ({}):", summary.anomalies.len());
        for anomaly in &summary.anomalies {
            println!("   {}", anomaly);
        }
        let failed = summary.anomalies.count(AnomalyKind::ConversationFailed);
        if failed > 0 {
            println!("   {} conversation(s) could not be archived", failed);
        }
    }

    // Performance stats
    println!();
    println!("⚡ Performance:");
    println!("   Total time:  {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}
