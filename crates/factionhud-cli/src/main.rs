//! factionhud - command-line war HUD for Torn factions.
//!
//! Watches both sides of a ranked war, tracks dibs on opponents and keeps a
//! personal watch-list, all through one rate-limited Torn API client.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use factionhud_core::api::KeyCheck;
use factionhud_core::models::{MemberSnapshot, TargetEntry};
use factionhud_core::roster::hospital_countdown;
use factionhud_core::utils::{format_clock, format_number, format_relative_time, parse_player_id};
use factionhud_core::{ClaimOutcome, Claimer, Config, HudContext};

// ============================================================================
// Constants
// ============================================================================

const LOG_FILE_PREFIX: &str = "factionhud.log";

/// Claims older than this are pruned when no age is given
const DEFAULT_CLAIM_MAX_AGE_HOURS: i64 = 24;

const USAGE: &str = "\
Usage: factionhud <command> [args]

Commands:
  set-key <key>          Validate and store a Torn API key
  set-tornstats-key <k>  Store a TornStats key for spy lookups
  check-key              Show who the stored key belongs to
  watch [own enemy]      Monitor a war (detects the active war if ids are omitted)
  claim <id> [name]      Call dibs on an opponent
  release <id>           Release a claim
  claims                 List current claims
  prune-claims [hours]   Drop claims older than <hours> (default 24)
  targets                List the watch-list
  add-target <id|url>    Add a player to the watch-list
  refresh-targets        Refresh every watch-list entry
  export-targets [file]  Write the watch-list as JSON (stdout by default)
  import-targets <file>  Merge a JSON watch-list export
  stats <id|url>         Battle stats from TornStats and YATA
  note <id> [text]       Show a player's note, or set it
  notes [query]          List notes, optionally filtered by text
  rate                   Show API budget usage";

/// Initialize the tracing subscriber: stderr plus a daily log file when the
/// data directory is usable. The returned guard flushes the file on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let log_dir = config
        .data_dir()
        .ok()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let _guard = init_tracing(log_dir.as_deref());
    info!("factionhud starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let ctx = HudContext::open(config)?;

    match command.as_str() {
        "set-key" => set_key(&ctx, rest).await,
        "set-tornstats-key" => set_tornstats_key(&ctx, rest),
        "check-key" => check_key(&ctx).await,
        "watch" => watch(&ctx, rest).await,
        "claim" => claim(&ctx, rest).await,
        "release" => release(&ctx, rest),
        "claims" => list_claims(&ctx),
        "prune-claims" => prune_claims(&ctx, rest),
        "targets" => list_targets(&ctx),
        "add-target" => add_target(&ctx, rest).await,
        "refresh-targets" => refresh_targets(&ctx).await,
        "export-targets" => export_targets(&ctx, rest),
        "import-targets" => import_targets(&ctx, rest),
        "stats" => stats(&ctx, rest).await,
        "note" => note(&ctx, rest),
        "notes" => list_notes(&ctx, rest),
        "rate" => rate(&ctx),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            anyhow::bail!("unknown command")
        }
    }
}

fn required_arg<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing argument: <{}>", name))
}

fn player_id_arg(args: &[String]) -> Result<String> {
    let raw = required_arg(args, "id")?;
    parse_player_id(raw).ok_or_else(|| anyhow::anyhow!("Not a player id: {}", raw))
}

// ============================================================================
// Credentials
// ============================================================================

async fn set_key(ctx: &HudContext, args: &[String]) -> Result<()> {
    let key = required_arg(args, "key")?;

    match ctx.client.validate_key(key).await? {
        KeyCheck::Valid { user_id, name, level } => {
            ctx.set_api_key(key)?;
            println!("Key saved for {} [{}], level {}", name, user_id, level);
            Ok(())
        }
        KeyCheck::Invalid { code, message } => {
            anyhow::bail!("Key rejected ({}): {}", code, message)
        }
    }
}

fn set_tornstats_key(ctx: &HudContext, args: &[String]) -> Result<()> {
    let key = required_arg(args, "key")?;
    ctx.set_tornstats_key(key)?;
    println!("TornStats key saved");
    Ok(())
}

async fn check_key(ctx: &HudContext) -> Result<()> {
    if !ctx.client.has_api_key() {
        anyhow::bail!("No API key configured. Run `factionhud set-key <key>` first.");
    }
    let user = ctx.client.get_user("").await?;
    println!(
        "{} [{}], level {}",
        user.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
        user.get("player_id").and_then(|v| v.as_i64()).unwrap_or_default(),
        user.get("level").and_then(|v| v.as_i64()).unwrap_or_default(),
    );
    Ok(())
}

/// The key owner, used as the claimer on dibs
async fn current_claimer(ctx: &HudContext) -> Option<Claimer> {
    match ctx.client.get_user("").await {
        Ok(user) => {
            let id = user.get("player_id").and_then(|v| v.as_i64())?;
            let name = user.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            Some(Claimer::new(id.to_string(), name))
        }
        Err(e) => {
            warn!(error = %e, "Could not identify key owner");
            None
        }
    }
}

// ============================================================================
// War monitor
// ============================================================================

async fn watch(ctx: &HudContext, args: &[String]) -> Result<()> {
    let (own_id, enemy_id) = match (args.first(), args.get(1)) {
        (Some(own), Some(enemy)) => (own.clone(), enemy.clone()),
        _ => {
            let war = ctx
                .detect_war()
                .await?
                .ok_or_else(|| anyhow::anyhow!("No active war found for your faction"))?;
            (war.own_id, war.enemy_id)
        }
    };

    ctx.roster.start(&own_id, &enemy_id).await;
    let interval = ctx.config.poll_interval();

    loop {
        print_roster(ctx);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    ctx.roster.stop();
    Ok(())
}

fn print_roster(ctx: &HudContext) {
    let now = Utc::now().timestamp();
    let scores = ctx.roster.scores();
    let rate = ctx.client.rate_status();

    println!(
        "\n== {} | score {} - {} | API {}/{} ==",
        Utc::now().format("%H:%M:%S"),
        scores.own_score,
        scores.opponent_score,
        rate.used,
        rate.limit
    );

    println!("-- Enemy --");
    for member in ctx.roster.enemy_members() {
        print_member(ctx, &member, now);
    }
    println!("-- Friendly --");
    for member in ctx.roster.friendly_members() {
        print_member(ctx, &member, now);
    }
}

fn print_member(ctx: &HudContext, member: &MemberSnapshot, now: i64) {
    let status = match hospital_countdown(member, now) {
        Some(countdown) => format!("Hospital {}", countdown),
        None => member.presence.to_string(),
    };
    let dibs = ctx
        .claims
        .get_by_opponent(&member.id)
        .map(|c| format!(" [dibs: {}]", c.claimer_label()))
        .unwrap_or_default();

    println!(
        "  {:<20} {:>3}  {:<16} {:<8}{}",
        member.name,
        member.level,
        status,
        member.online_status(),
        dibs
    );
}

// ============================================================================
// Claims
// ============================================================================

async fn claim(ctx: &HudContext, args: &[String]) -> Result<()> {
    let opponent_id = player_id_arg(args)?;
    let name = args.get(1).map(String::as_str).unwrap_or_default();
    let claimer = current_claimer(ctx).await;

    match ctx.claims.claim(&opponent_id, name, claimer.as_ref()) {
        ClaimOutcome::Claimed(record) => {
            println!("Dibs on {} [{}]", record.opponent_name, record.opponent_id);
        }
        ClaimOutcome::AlreadyClaimed(record) => {
            println!(
                "{} [{}] is already claimed by {}",
                record.opponent_name,
                record.opponent_id,
                record.claimer_label()
            );
        }
    }
    Ok(())
}

fn release(ctx: &HudContext, args: &[String]) -> Result<()> {
    let opponent_id = player_id_arg(args)?;
    if ctx.claims.release(&opponent_id) {
        println!("Released {}", opponent_id);
    } else {
        println!("No claim on {}", opponent_id);
    }
    Ok(())
}

fn list_claims(ctx: &HudContext) -> Result<()> {
    let claims = ctx.claims.all();
    if claims.is_empty() {
        println!("No claims");
        return Ok(());
    }

    let now = Utc::now().timestamp();
    for record in claims {
        println!(
            "  {:<20} [{}] by {} ({})",
            record.opponent_name,
            record.opponent_id,
            record.claimer_label(),
            format_relative_time(record.claimed_at.timestamp(), now)
        );
    }
    Ok(())
}

fn prune_claims(ctx: &HudContext, args: &[String]) -> Result<()> {
    let hours = match args.first() {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("Not a number of hours: {}", raw))?,
        None => DEFAULT_CLAIM_MAX_AGE_HOURS,
    };
    let removed = ctx.claims.clear_expired(hours);
    println!("Removed {} claim(s) older than {}h", removed, hours);
    Ok(())
}

// ============================================================================
// Watch-list
// ============================================================================

fn print_target(entry: &TargetEntry, now: i64) {
    let status = match entry.incapacitation_until.filter(|&until| until > now) {
        Some(until) => format!("{} {}", entry.presence_state, format_clock(until - now)),
        None => entry.presence_state.to_string(),
    };
    println!(
        "  {:<20} [{}] lvl {:>3}  {:<20} {}",
        entry.name,
        entry.id,
        entry.level,
        status,
        entry.last_action.as_deref().unwrap_or("")
    );
}

fn list_targets(ctx: &HudContext) -> Result<()> {
    let targets = ctx.targets.all();
    if targets.is_empty() {
        println!("Watch-list is empty");
        return Ok(());
    }
    let now = Utc::now().timestamp();
    for entry in &targets {
        print_target(entry, now);
    }
    Ok(())
}

async fn add_target(ctx: &HudContext, args: &[String]) -> Result<()> {
    let id = player_id_arg(args)?;
    ctx.targets.add(TargetEntry::new(id.clone()));

    match ctx.targets.refresh(&id).await {
        Some(entry) => print_target(&entry, Utc::now().timestamp()),
        None => println!("Added {} (profile not loaded, see log)", id),
    }
    Ok(())
}

async fn refresh_targets(ctx: &HudContext) -> Result<()> {
    let total = ctx.targets.len();
    let refreshed = ctx.targets.refresh_all().await;
    println!("Refreshed {}/{} targets", refreshed, total);
    list_targets(ctx)
}

fn export_targets(ctx: &HudContext, args: &[String]) -> Result<()> {
    let json = ctx.targets.export()?;
    match args.first() {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            println!("Exported {} targets to {}", ctx.targets.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn import_targets(ctx: &HudContext, args: &[String]) -> Result<()> {
    let path = required_arg(args, "file")?;
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let imported = ctx.targets.import(&json);
    println!("Imported {} targets", imported);
    Ok(())
}

// ============================================================================
// Stats and notes
// ============================================================================

async fn stats(ctx: &HudContext, args: &[String]) -> Result<()> {
    let id = player_id_arg(args)?;
    if !ctx.stats.is_tornstats_configured() {
        println!("TornStats key not set, spy lookup skipped");
    }
    let combined = ctx.stats.get_combined_stats(&id).await;

    match &combined.torn_stats {
        Some(spy) => println!(
            "Spy ({}): STR {}  SPD {}  DEX {}  DEF {}  total {}  ({})",
            spy.source,
            format_number(spy.strength),
            format_number(spy.speed),
            format_number(spy.dexterity),
            format_number(spy.defense),
            format_number(spy.total),
            format_relative_time(spy.timestamp, Utc::now().timestamp())
        ),
        None => println!("Spy: none"),
    }
    match &combined.fair_fight {
        Some(ff) => println!(
            "Estimate ({}): battle score {}  fair fight {}",
            ff.source,
            ff.estimate.map(format_number).unwrap_or_else(|| "?".to_string()),
            ff.fair_fight
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "?".to_string())
        ),
        None => println!("Estimate: none"),
    }
    Ok(())
}

/// Everything after the player id, joined back into one note text
fn note_text(args: &[String]) -> Option<String> {
    let text = args.get(1..)?.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn note(ctx: &HudContext, args: &[String]) -> Result<()> {
    let id = player_id_arg(args)?;
    match note_text(args) {
        Some(text) => {
            ctx.notes.set(&id, &text, "");
            println!("Note saved for {}", id);
        }
        None if ctx.notes.has(&id) => println!("{}: {}", id, ctx.notes.get(&id).text),
        None => println!("No note for {}", id),
    }
    Ok(())
}

fn list_notes(ctx: &HudContext, args: &[String]) -> Result<()> {
    let notes = match args.first() {
        Some(query) => ctx.notes.search(query),
        None => ctx.notes.all().into_iter().collect(),
    };
    if notes.is_empty() {
        println!("No notes");
    }
    for (id, note) in notes {
        println!("  [{}] {}", id, note.text);
    }
    Ok(())
}

fn rate(ctx: &HudContext) -> Result<()> {
    let status = ctx.client.rate_status();
    println!(
        "{} of {} calls used, {} remaining, window resets in {}s",
        status.used, status.limit, status.remaining, status.reset_in_seconds
    );
    Ok(())
}
