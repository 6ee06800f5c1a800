//! Everbranch demo shell.
//!
//! A slash-command REPL over the in-memory stores with a small seeded
//! world. Exit codes: 0 on a clean quit, 1 for user errors on startup,
//! 2 for internal errors.

mod commands;
mod world;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::error;

use eb_engine::context::{Intent, IntentKind};
use eb_engine::multiverse;
use eb_mechanics::dice::SeededRoller;
use eb_mechanics::overlay::named_overlay;
use eb_store::ports::{GraphRepo, TruthRepo};

use commands::{parse_line, Command, HELP_TEXT};

/// A neuro-symbolic text adventure with forkable timelines.
#[derive(Debug, Parser)]
#[command(name = "everbranch", version)]
struct Args {
    /// Seed the dice for a reproducible session.
    #[arg(long)]
    seed: Option<u64>,

    /// Apply a named physics overlay (e.g. dead_magic_zone, high_tech).
    #[arg(long)]
    overlay: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::User(message)) => {
            eprintln!("{}", message.red());
            ExitCode::from(1)
        }
        Err(RunError::Internal(message)) => {
            error!("{message}");
            eprintln!("{}", "internal error, see log".red());
            ExitCode::from(2)
        }
    }
}

enum RunError {
    User(String),
    Internal(String),
}

fn run(args: Args) -> Result<(), RunError> {
    let mut router = world::demo_router();

    if let Some(seed) = args.seed {
        router = router.with_roller(Box::new(SeededRoller::seeded(seed)));
    }
    if let Some(name) = &args.overlay {
        let overlay = named_overlay(name)
            .ok_or_else(|| RunError::User(format!("unknown overlay '{name}'")))?;
        router = router.with_overlay(overlay);
    }

    println!("{}", "Everbranch".bold());
    println!("You are Wren, seated in The Crooked Flagon. Type /help for commands.\n");

    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        print!("{} ", ">".cyan());
        out.flush().map_err(|e| RunError::Internal(e.to_string()))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| RunError::Internal(e.to_string()))?;
        if read == 0 {
            break; // EOF
        }

        match parse_line(&line) {
            Command::Quit => break,
            Command::Help => println!("{HELP_TEXT}"),
            Command::Clear => print!("\x1B[2J\x1B[H"),
            Command::Save => println!("The event log is the save. Nothing else to do."),
            Command::Status => print_status(&router),
            Command::History => print_history(&router),
            Command::Inventory => print_inventory(&router),
            Command::Quests => print_quests(&router),
            Command::Abilities => println!("Known: Healing Word (level 1)."),
            Command::Reputation => print_reputation(&router),
            Command::Setting => print_setting(&router, args.overlay.as_deref()),
            Command::Fork(reason) => {
                let mut intent = Intent::new(IntentKind::Fork);
                intent.fork_reason = if reason.is_empty() {
                    Some("a fork in the road".to_string())
                } else {
                    Some(reason)
                };
                let turn = router.handle(&intent);
                print_turn(&turn.result.description, turn.result.success);
                if let Some(universe) = turn.forked_universe {
                    println!("  {} {universe}", "now in universe".dimmed());
                }
            }
            Command::Play(intent) => {
                let turn = router.handle(&intent);
                print_turn(&turn.result.description, turn.result.success);
                if let Some(gm) = &turn.result.gm_move_description {
                    if turn.result.gm_move_type.is_some() {
                        println!("  {} {gm}", "GM:".yellow());
                    }
                }
                for change in &turn.result.state_changes {
                    println!("  {} {change}", "*".dimmed());
                }
            }
            Command::Unknown(input) => {
                if !input.is_empty() {
                    println!("{} {input}", "unknown command:".red());
                }
            }
        }
    }

    println!("Farewell.");
    Ok(())
}

type DemoRouter = eb_engine::router::Router<
    eb_store::memory::MemoryTruthRepo,
    eb_store::memory::MemoryGraphRepo,
>;

fn print_turn(description: &str, success: bool) {
    if success {
        println!("{description}");
    } else {
        println!("{}", description.red());
    }
}

fn print_status(router: &DemoRouter) {
    let session = &router.session;
    let Ok(Some(actor)) = router.truth().load_entity(session.actor_id, session.universe_id) else {
        println!("No actor loaded.");
        return;
    };
    println!("{}", actor.name.bold());
    if let Some(stats) = actor.character_stats() {
        println!("  HP {}/{}  AC {}  level {}", stats.hp_current, stats.hp_max, stats.ac, stats.level);
        if let Some(pool) = &stats.resources.stress_momentum {
            println!(
                "  stress {}/{}  momentum {}/{}",
                pool.stress, pool.stress_max, pool.momentum, pool.momentum_max
            );
        }
        println!(
            "  defy death {}/{}",
            stats.resources.defy_death.uses_remaining(),
            stats.resources.defy_death.max_uses
        );
    }
    println!("  turn {}  universe {}", session.turn_count, session.universe_id);
}

fn print_history(router: &DemoRouter) {
    let session = &router.session;
    match router.truth().list_events(session.universe_id, 1000, 0) {
        Ok(events) => {
            let start = events.len().saturating_sub(10);
            for event in &events[start..] {
                println!("  {:?} ({})", event.event_type, event.outcome);
            }
            if events.is_empty() {
                println!("  Nothing has happened yet.");
            }
        }
        Err(err) => println!("{}", err.to_string().red()),
    }
}

fn print_inventory(router: &DemoRouter) {
    let session = &router.session;
    let edges = router
        .graph()
        .relationships_of(session.actor_id, session.universe_id, None)
        .unwrap_or_default();
    let mut any = false;
    for edge in edges {
        if edge.kind.is_inventory() && edge.source == session.actor_id {
            if let Ok(Some(item)) = router.truth().load_entity(edge.target, session.universe_id) {
                if item.active {
                    println!("  {} ({})", item.name, edge.kind);
                    any = true;
                }
            }
        }
    }
    if !any {
        println!("  You carry nothing.");
    }
}

fn print_quests(router: &DemoRouter) {
    match router.truth().list_quests(router.session.universe_id) {
        Ok(quests) if quests.is_empty() => println!("  No quests yet."),
        Ok(quests) => {
            for quest in quests {
                println!("  {} [{:?}]", quest.name, quest.status);
            }
        }
        Err(err) => println!("{}", err.to_string().red()),
    }
}

fn print_reputation(router: &DemoRouter) {
    let session = &router.session;
    let Ok(Some(actor)) = router.truth().load_entity(session.actor_id, session.universe_id) else {
        return;
    };
    let Some(stats) = actor.character_stats() else {
        return;
    };
    if stats.faction_reputation.is_empty() {
        println!("  No faction has an opinion of you yet.");
        return;
    }
    for (faction, standing) in &stats.faction_reputation {
        println!(
            "  {faction}: {standing} ({})",
            eb_engine::reputation::reputation_tier(*standing)
        );
    }
}

fn print_setting(router: &DemoRouter, overlay: Option<&str>) {
    let session = &router.session;
    if let Ok(lineage) = multiverse::lineage(router.truth(), session.universe_id) {
        let names: Vec<String> = lineage.iter().map(|u| u.name.clone()).collect();
        println!("  timeline: {}", names.join(" -> "));
    }
    println!("  overlay: {}", overlay.unwrap_or("none"));
}
