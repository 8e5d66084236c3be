use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clipseq_core::images::ImageCache;
use clipseq_core::{
    execute_plan, ingest_files, ingest_image, ingest_text, join, plan_paste_all, CaptureGate,
    DuplicatePolicy, IngestOutcome, Item, ItemId, ItemKind, ItemStatus, JoinMode, PasteAllMode,
    PasteOptions, PasteStep, Query, Store, StoreImpl,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod target;

use config::Settings;
use target::WriterTarget;

#[derive(Parser)]
#[command(name = "clipseq", version, about = "Clipboard history queue with merge-on-repeat and text joining")]
struct Cli {
    /// Database file (overrides [storage] db_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Items(ItemCommand),
    /// Apply pending schema migrations
    Migrate {
        #[arg(long)]
        status: bool,
    },
    /// Print resolved settings and paths
    Config {
        #[arg(long)]
        json: bool,
    },
}

/// Commands that work on an open, fully migrated store.
#[derive(Subcommand)]
enum ItemCommand {
    /// Create the database and apply migrations
    InitDb,
    /// Record a text capture (reads STDIN if TEXT is omitted)
    Add {
        text: Option<String>,
        /// Duplicate handling: count or separate (defaults to settings)
        #[arg(long)]
        policy: Option<DuplicatePolicy>,
        /// Application the text was copied from; blacklisted apps are ignored
        #[arg(long)]
        source_app: Option<String>,
    },
    /// Record an image capture
    AddImage {
        path: PathBuf,
        /// Reference the file in place instead of copying it into the image cache
        #[arg(long)]
        no_copy: bool,
    },
    /// Record a file-list capture
    AddFiles {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List history in capture order
    List {
        #[arg(long)]
        favorites: bool,
        #[arg(long, conflicts_with = "active")]
        used: bool,
        #[arg(long)]
        active: bool,
        #[arg(long)]
        kind: Option<ItemKind>,
        /// Only items captured in the open session
        #[arg(long)]
        current_session: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show one item
    Show {
        id: ItemId,
        #[arg(long)]
        json: bool,
    },
    Favorite { id: ItemId },
    Unfavorite { id: ItemId },
    /// Mark an item as used
    Used { id: ItemId },
    /// Put a used item back in the queue
    Active { id: ItemId },
    /// Remove items, or everything when no ids are given
    Delete { ids: Vec<ItemId> },
    /// Join text items (all active text when no ids are given) and print the result
    Join {
        ids: Vec<ItemId>,
        #[arg(long)]
        mode: Option<JoinMode>,
        /// Separator for --mode custom
        #[arg(long)]
        sep: Option<String>,
    },
    /// Paste one item (the first active one when no id is given)
    Paste {
        id: Option<ItemId>,
        /// Pick the first favorite instead, whatever its status
        #[arg(long, conflicts_with = "id")]
        favorites: bool,
        #[arg(long)]
        json: bool,
    },
    /// Paste every active item, or every favorite with --favorites
    PasteAll {
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        mode: Option<PasteAllMode>,
        /// Print the plan without pasting or marking anything
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Inspect or control capture sessions
    Session {
        #[command(subcommand)]
        action: SessionCmd,
    },
}

#[derive(Subcommand)]
enum SessionCmd {
    /// Print the open session id, opening one if needed
    Current,
    Close,
    /// Close the open session and start a new one
    New,
    List {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(path: &Path, auto_migrate: bool) -> Result<StoreImpl> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    StoreImpl::new_with(path, auto_migrate)
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn require(store: &dyn Store, id: ItemId) -> Result<Item> {
    match store.get(id)? {
        Some(item) => Ok(item),
        None => bail!("no item with id {}", id),
    }
}

fn print_items(items: &[Item], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", render::list_line(item));
        }
    }
    Ok(())
}

fn report_outcome(outcome: IngestOutcome) {
    match outcome {
        IngestOutcome::Created(id) => println!("added {}", id),
        IngestOutcome::Merged(id) => println!("merged {}", id),
        IngestOutcome::Skipped => println!("skipped"),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = config::load_settings()?;
    let db = cli.db.clone().unwrap_or_else(|| config::db_path(&settings));
    tracing::debug!(db = %db.display(), "resolved database path");

    match cli.command {
        Commands::Config { json } => show_config(&settings, &db, json)?,
        Commands::Migrate { status } => {
            let store = open_store(&db, false)?;
            if status {
                let st = store.migration_status()?;
                println!("current: {}", st.current);
                println!("latest: {}", st.latest);
                if st.pending.is_empty() {
                    println!("pending: none");
                } else {
                    println!("pending: {}", st.pending.join(", "));
                }
            } else {
                store.migrate_all()?;
                println!("migrated to version {}", store.migration_status()?.latest);
            }
        }
        Commands::Items(command) => {
            let store = open_store(&db, true)?;
            run(command, &store, &settings, &db)?;
        }
    }
    Ok(())
}

fn run(command: ItemCommand, store: &StoreImpl, settings: &Settings, db: &Path) -> Result<()> {
    match command {
        ItemCommand::InitDb => {
            store.init()?;
            println!("database initialized at {}", db.display());
        }
        ItemCommand::Add {
            text,
            policy,
            source_app,
        } => {
            let gate = CaptureGate::new(&settings.blacklist);
            if !gate.admit(source_app.as_deref()) {
                println!("skipped");
                return Ok(());
            }
            let text = match text {
                Some(t) => t,
                None => read_stdin()?,
            };
            let policy = policy.unwrap_or(settings.duplicate_policy);
            report_outcome(ingest_text(store, &text, policy)?);
        }
        ItemCommand::AddImage { path, no_copy } => {
            let stored = if no_copy {
                if !path.is_file() {
                    bail!("no such image: {}", path.display());
                }
                std::fs::canonicalize(&path)?
            } else {
                ImageCache::new(config::images_dir(settings))
                    .import(&path)
                    .with_context(|| format!("caching {}", path.display()))?
            };
            report_outcome(ingest_image(store, &stored.to_string_lossy())?);
        }
        ItemCommand::AddFiles { paths } => report_outcome(ingest_files(store, &paths)?),
        ItemCommand::List {
            favorites,
            used,
            active,
            kind,
            current_session,
            limit,
            json,
        } => {
            let session = if current_session {
                match store.list_sessions()?.into_iter().rev().find(|s| s.is_open()) {
                    Some(s) => Some(s.id),
                    None => return print_items(&[], json),
                }
            } else {
                None
            };
            let status = if used {
                Some(ItemStatus::Used)
            } else if active {
                Some(ItemStatus::Active)
            } else {
                None
            };
            let items = store.list(Query {
                kind,
                status,
                favorites_only: favorites,
                session,
                limit: Some(limit.unwrap_or(settings.history_default_count)),
            })?;
            print_items(&items, json)?;
        }
        ItemCommand::Show { id, json } => {
            let item = require(store, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("{}", render::detail(&item));
            }
        }
        ItemCommand::Favorite { id } => {
            store.favorite(id, true)?;
            println!("favorited {}", id);
        }
        ItemCommand::Unfavorite { id } => {
            store.favorite(id, false)?;
            println!("unfavorited {}", id);
        }
        ItemCommand::Used { id } => {
            store.mark_used(id)?;
            println!("used {}", id);
        }
        ItemCommand::Active { id } => {
            store.mark_active(id)?;
            println!("active {}", id);
        }
        ItemCommand::Delete { ids } => {
            if ids.is_empty() {
                store.clear()?;
                println!("cleared");
            } else {
                let n = store.delete(&ids)?;
                println!("deleted {}", n);
            }
        }
        ItemCommand::Join { ids, mode, sep } => {
            let items = if ids.is_empty() {
                store.list(Query {
                    kind: Some(ItemKind::Text),
                    status: Some(ItemStatus::Active),
                    ..Query::default()
                })?
            } else {
                ids.iter()
                    .map(|&id| require(store, id))
                    .collect::<Result<Vec<_>>>()?
            };
            for other in items.iter().filter(|i| i.kind() != ItemKind::Text) {
                tracing::warn!(id = other.id, kind = %other.kind(), "non-text item left out of join");
            }
            let mode = mode.unwrap_or(settings.joiner_mode);
            let sep = sep.as_deref().unwrap_or(&settings.joiner_custom_sep);
            println!("{}", join(items.iter().map(Item::text), mode, sep));
        }
        ItemCommand::Paste {
            id,
            favorites,
            json,
        } => paste_one(store, settings, id, favorites, json)?,
        ItemCommand::PasteAll {
            favorites,
            mode,
            dry_run,
            json,
        } => paste_all(store, settings, favorites, mode, dry_run, json)?,
        ItemCommand::Session { action } => session(store, action)?,
    }
    Ok(())
}

fn paste_all(
    store: &StoreImpl,
    settings: &Settings,
    favorites: bool,
    mode: Option<PasteAllMode>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let items = store.list(paste_queue(favorites))?;
    let mode = mode.unwrap_or(settings.paste_all_text_mode);
    let steps = plan_paste_all(&items, mode, settings.joiner_mode, &settings.joiner_custom_sep);

    if dry_run {
        if json {
            println!("{}", serde_json::to_string_pretty(&steps)?);
        } else {
            for step in &steps {
                println!("{}", render::step_line(step));
            }
        }
        return Ok(());
    }

    run_paste(store, settings, &steps, json)
}

/// Active items in capture order. Favorites are picked regardless of status,
/// since they are meant to be pasted again and again.
fn paste_queue(favorites: bool) -> Query {
    if favorites {
        Query {
            favorites_only: true,
            ..Query::default()
        }
    } else {
        Query {
            status: Some(ItemStatus::Active),
            ..Query::default()
        }
    }
}

fn paste_one(
    store: &StoreImpl,
    settings: &Settings,
    id: Option<ItemId>,
    favorites: bool,
    json: bool,
) -> Result<()> {
    let item = match id {
        Some(id) => require(store, id)?,
        None => {
            let mut q = paste_queue(favorites);
            q.limit = Some(1);
            match store.list(q)?.into_iter().next() {
                Some(item) => item,
                None => bail!("nothing to paste"),
            }
        }
    };
    let steps = plan_paste_all(
        std::slice::from_ref(&item),
        PasteAllMode::Step,
        settings.joiner_mode,
        &settings.joiner_custom_sep,
    );
    run_paste(store, settings, &steps, json)
}

fn run_paste(store: &StoreImpl, settings: &Settings, steps: &[PasteStep], json: bool) -> Result<()> {
    let gate = CaptureGate::new(&settings.blacklist);
    let opts = PasteOptions {
        interval: settings.paste_interval(),
        max_retries: settings.max_retries,
        mark_used: settings.dequeue_on_paste,
    };
    let report = if json {
        // pasted content goes to stderr so stdout stays valid JSON
        let mut target = WriterTarget::new(std::io::stderr());
        let report = execute_plan(store, &mut target, Some(&gate), steps, &opts)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        report
    } else {
        let mut target = WriterTarget::new(std::io::stdout());
        execute_plan(store, &mut target, Some(&gate), steps, &opts)?
    };
    for failure in &report.failures {
        eprintln!("paste failed for {:?}: {}", failure.sources, failure.message);
    }
    if !report.failures.is_empty() {
        bail!("{} of {} paste steps failed", report.failures.len(), steps.len());
    }
    Ok(())
}

fn session(store: &StoreImpl, action: SessionCmd) -> Result<()> {
    match action {
        SessionCmd::Current => println!("{}", store.current_session()?),
        SessionCmd::Close => match store.close_session()? {
            Some(id) => println!("closed session {}", id),
            None => println!("no open session"),
        },
        SessionCmd::New => {
            store.close_session()?;
            println!("opened session {}", store.current_session()?);
        }
        SessionCmd::List { json } => {
            let sessions = store.list_sessions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                for s in &sessions {
                    println!("{}", render::session_line(s));
                }
            }
        }
    }
    Ok(())
}

fn show_config(settings: &Settings, db: &Path, json: bool) -> Result<()> {
    let images = config::images_dir(settings);
    if json {
        let mut v = serde_json::to_value(settings)?;
        if let Some(obj) = v.as_object_mut() {
            obj.insert("config_dir".into(), config::config_dir().display().to_string().into());
            obj.insert("settings_path".into(), config::settings_path().display().to_string().into());
            obj.insert("db_path".into(), db.display().to_string().into());
            obj.insert("images_dir".into(), images.display().to_string().into());
        }
        println!("{}", serde_json::to_string_pretty(&v)?);
    } else {
        println!("settings: {}", config::settings_path().display());
        println!("database: {}", db.display());
        println!("images:   {}", images.display());
        print!("{}", toml::to_string_pretty(settings)?);
    }
    Ok(())
}
