//! Input parsing for the shell: slash commands and a small verb grammar
//! that turns free text into structured intents.

use eb_engine::context::{Intent, IntentKind};

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    History,
    Inventory,
    Quests,
    Abilities,
    Reputation,
    Setting,
    Save,
    Clear,
    Fork(String),
    Quit,
    /// A structured action for the router.
    Play(Intent),
    Unknown(String),
}

/// Parse one line. Slash commands are checked first; anything else goes
/// through the verb grammar.
pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Unknown(String::new());
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        let (command, argument) = match rest.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (rest, ""),
        };
        return match command.to_lowercase().as_str() {
            "help" => Command::Help,
            "status" => Command::Status,
            "look" => Command::Play(Intent::new(IntentKind::Look)),
            "history" => Command::History,
            "save" => Command::Save,
            "fork" => Command::Fork(argument.to_string()),
            "clear" => Command::Clear,
            "inventory" => Command::Inventory,
            "quests" => Command::Quests,
            "abilities" => Command::Abilities,
            "use" => {
                let mut intent = Intent::new(IntentKind::UseItem);
                intent.target_name = Some(argument.to_string());
                Command::Play(intent)
            }
            "talk" => {
                let mut intent = Intent::new(IntentKind::Talk);
                intent.target_name = Some(argument.to_string());
                Command::Play(intent)
            }
            "reputation" => Command::Reputation,
            "setting" => Command::Setting,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(format!("/{other}")),
        };
    }

    Command::Play(parse_intent(trimmed))
}

/// Pattern-match free text into an intent. Unrecognized verbs come back as
/// `Unclear`, which the router refuses without consuming anything.
pub fn parse_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    let mut words = lower.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    let object = strip_articles(&rest);

    let mut intent = match verb {
        "attack" | "hit" | "strike" | "stab" | "fight" => {
            let mut intent = Intent::new(IntentKind::Attack);
            intent.target_name = object;
            intent
        }
        "go" | "walk" | "move" | "head" | "travel" => {
            let mut intent = Intent::new(IntentKind::Move);
            intent.destination = object;
            intent
        }
        "look" | "examine" | "observe" => Intent::new(IntentKind::Look),
        "search" | "investigate" => Intent::new(IntentKind::Search),
        "persuade" | "convince" => {
            let mut intent = Intent::new(IntentKind::Persuade);
            intent.target_name = object;
            intent
        }
        "intimidate" | "threaten" => {
            let mut intent = Intent::new(IntentKind::Intimidate);
            intent.target_name = object;
            intent
        }
        "lie" | "deceive" | "bluff" => {
            let mut intent = Intent::new(IntentKind::Deceive);
            intent.target_name = object;
            intent
        }
        "say" | "talk" | "tell" | "ask" => {
            let mut intent = Intent::new(IntentKind::Talk);
            intent.dialogue = Some(rest.join(" "));
            intent
        }
        "rest" | "sleep" | "camp" => {
            let mut intent = Intent::new(IntentKind::Rest);
            if lower.contains("long") {
                intent.rest_kind = Some("long".to_string());
            } else {
                intent.rest_kind = Some("short".to_string());
            }
            intent
        }
        "take" | "grab" | "get" => {
            let mut intent = Intent::new(IntentKind::PickUp);
            intent.target_name = object;
            intent
        }
        "drop" | "discard" => {
            let mut intent = Intent::new(IntentKind::Drop);
            intent.target_name = object;
            intent
        }
        "wait" => Intent::new(IntentKind::Wait),
        _ => Intent::new(IntentKind::Unclear),
    };

    intent.original_input = text.to_string();
    intent
}

fn strip_articles(words: &[&str]) -> Option<String> {
    let filtered: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !matches!(*w, "the" | "a" | "an" | "at" | "to" | "rest"))
        .collect();
    if filtered.is_empty() {
        None
    } else {
        Some(filtered.join(" "))
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  /help         This text
  /status       Actor HP, resources, and session info
  /look         Describe the current location
  /history      Recent events in this universe
  /inventory    What you are carrying
  /quests       Quest log
  /abilities    Known abilities
  /reputation   Faction standings
  /setting      Universe and physics overlay info
  /fork <why>   Branch reality from this moment
  /save         Confirm the log is durable
  /clear        Clear the screen
  /quit         Leave

Actions (free text):
  attack <target>      go <direction>       look / search
  persuade <target>    intimidate <target>  lie <target>
  say <words>          take <item>          drop <item>
  rest [long]          wait";
