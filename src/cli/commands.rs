use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::feed::FeedView;
use crate::history;
use crate::ledger::{HistoryLedger, LedgerStore};
use crate::lookup::{SongLookup, TrackHit};
use crate::messages::{Message, MessageService, NewMessage};
use crate::search::SearchBox;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Recipient name (prompted if omitted)
    #[arg(long)]
    pub to: Option<String>,
    /// The note to attach. If omitted, prompted or read from stdin.
    #[arg(long)]
    pub message: Option<String>,
    /// Song search term; the first catalog match is attached without
    /// the interactive picker
    #[arg(long)]
    pub song: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    /// Filter by recipient, message, song title, or artist
    #[arg()]
    pub query: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Message identifier
    pub id: String,
}

pub fn send_message<S: LedgerStore>(
    config: Arc<AppConfig>,
    lookup: &dyn SongLookup,
    service: &dyn MessageService,
    ledger: &HistoryLedger<S>,
    args: SendArgs,
) -> Result<()> {
    let recipient = match args.to {
        Some(to) => to,
        None => prompt("To")?,
    };
    let recipient = recipient.trim().to_owned();
    if recipient.is_empty() {
        bail!("recipient cannot be empty");
    }

    let message = match args.message {
        Some(message) => message,
        None => match read_stdin()? {
            Some(body) => body,
            None => prompt("Message")?,
        },
    };
    let message = message.trim().to_owned();
    if message.is_empty() {
        bail!("message cannot be empty");
    }

    let mut search = SearchBox::new(&config.search);
    let track = match args.song {
        Some(term) => pick_first_match(&mut search, lookup, &term)?,
        None => pick_interactively(&mut search, lookup)?,
    };

    let record = publish(service, ledger, &recipient, &message, &track)
        .context("publishing message")?;
    println!(
        "Sent \"{}\" — {} to {} (message id {})",
        record.song_title, record.artist, record.recipient, record.id
    );
    Ok(())
}

pub fn show_history<S: LedgerStore>(
    service: &dyn MessageService,
    ledger: &HistoryLedger<S>,
) -> Result<()> {
    let messages = history::load(ledger, service).context("loading sent history")?;
    print!("{}", render_history(&messages));
    Ok(())
}

pub fn browse(service: &dyn MessageService, args: BrowseArgs) -> Result<()> {
    let query = args.query.join(" ");
    let output = run_browse(service, query.trim())?;
    print!("{output}");
    Ok(())
}

pub fn view(service: &dyn MessageService, args: ViewArgs) -> Result<()> {
    let output = run_view(service, &args.id)?;
    print!("{output}");
    Ok(())
}

/// Insert the message, then record its id in the local ledger. A ledger
/// write failure degrades to "history not recorded"; the send itself has
/// already succeeded.
fn publish<S: LedgerStore>(
    service: &dyn MessageService,
    ledger: &HistoryLedger<S>,
    recipient: &str,
    message: &str,
    track: &TrackHit,
) -> Result<Message, crate::messages::ServiceError> {
    let record = service.insert(&NewMessage::from_track(recipient, message, track))?;
    ledger.append(&record.id);
    Ok(record)
}

/// Drive the debounced search until the settle timer fires and the
/// lookup completes.
fn settle(search: &mut SearchBox, lookup: &dyn SongLookup) {
    while search.has_pending() {
        if search.poll(lookup) {
            break;
        }
        thread::sleep(SETTLE_POLL_INTERVAL);
    }
}

fn pick_first_match(
    search: &mut SearchBox,
    lookup: &dyn SongLookup,
    term: &str,
) -> Result<TrackHit> {
    search.on_query_change(term);
    settle(search, lookup);
    let Some(hit) = search.results().first().cloned() else {
        bail!("no catalog matches for '{term}'");
    };
    search.select(hit.clone());
    Ok(hit)
}

fn pick_interactively(search: &mut SearchBox, lookup: &dyn SongLookup) -> Result<TrackHit> {
    loop {
        let input = prompt("Search a song")?;
        search.on_query_change(&input);
        settle(search, lookup);

        if search.results().is_empty() {
            println!("No matches. Try another search.");
            continue;
        }
        for (index, hit) in search.results().iter().enumerate() {
            println!("{}. {} — {}", index + 1, hit.track_name, hit.artist_name);
        }

        let choice = prompt("Pick a number (Enter to search again)")?;
        let choice = choice.trim();
        if choice.is_empty() {
            continue;
        }
        match choice.parse::<usize>() {
            Ok(n) if n >= 1 && n <= search.results().len() => {
                let hit = search.results()[n - 1].clone();
                search.select(hit.clone());
                return Ok(hit);
            }
            _ => println!("Invalid choice."),
        }
    }
}

fn render_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "No history yet. Sent messages appear here and expire after 7 days.\n".to_string();
    }
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(
            &mut out,
            "To {}  ({})",
            message.recipient,
            format_timestamp(&message.created_at)
        );
        let _ = writeln!(
            &mut out,
            "    {} — {}",
            message.song_title, message.artist
        );
        let _ = writeln!(&mut out, "    \"{}\"", message.message);
        if let Some(preview) = &message.preview {
            let _ = writeln!(&mut out, "    preview {preview}");
        }
        out.push('\n');
    }
    out
}

fn run_browse(service: &dyn MessageService, query: &str) -> Result<String> {
    let mut feed = FeedView::new();
    feed.refresh(service).context("fetching the public feed")?;
    let matches = feed.filter(query);

    if matches.is_empty() {
        return Ok(if query.is_empty() {
            "No messages yet. Be the first to share one!\n".to_string()
        } else {
            format!("No messages match '{query}'.\n")
        });
    }

    let mut out = String::new();
    for message in matches {
        let _ = writeln!(
            &mut out,
            "{}  To {}  ({})",
            message.id,
            message.recipient,
            format_timestamp(&message.created_at)
        );
        let _ = writeln!(
            &mut out,
            "    {} — {}",
            message.song_title, message.artist
        );
        let _ = writeln!(&mut out, "    \"{}\"", snippet(&message.message, 120));
        out.push('\n');
    }
    Ok(out)
}

fn run_view(service: &dyn MessageService, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        bail!("message id cannot be empty");
    }
    let Some(message) = service
        .fetch_by_id(id)
        .context("fetching message")?
    else {
        return Ok("Message not found. It may have been deleted or never existed.\n".to_string());
    };

    let mut out = String::new();
    let _ = writeln!(&mut out, "Hello, {}", message.recipient);
    let _ = writeln!(
        &mut out,
        "{} — {}",
        message.song_title, message.artist
    );
    if let Some(preview) = &message.preview {
        let _ = writeln!(&mut out, "preview {preview}");
    }
    let _ = writeln!(&mut out, "\n\"{}\"", message.message);
    let _ = writeln!(
        &mut out,
        "\nsent {}",
        format_timestamp(&message.created_at)
    );
    Ok(out)
}

fn snippet(body: &str, max_chars: usize) -> String {
    let flattened = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated: String = flattened.chars().take(max_chars).collect();
    truncated.push_str(" ...");
    truncated
}

fn format_timestamp(raw: &str) -> String {
    let format = format_description!("[day] [month repr:short] [year]");
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
