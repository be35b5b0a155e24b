use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use tokio::sync::mpsc;

use inspiration_wall::account::{SignInForm, SignUpForm, random_dna};
use inspiration_wall::app::{AppEffect, View, WallApp};
use inspiration_wall::backend::{ImageUpload, SignUpOutcome};
use inspiration_wall::config::WallConfig;
use inspiration_wall::error::WallError;
use inspiration_wall::filter::CategoryFilter;
use inspiration_wall::loader::LoadOutcome;
use inspiration_wall::model::{DEFAULT_CATEGORIES, Visibility};
use inspiration_wall::mutation::InspirationDraft;
use inspiration_wall::watchdog::PageVisibility;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Wall(#[from] WallError),
    #[error("io failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Load(String),
}

#[derive(Parser, Debug)]
#[command(name = "wall", about = "Inspiration wall client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the public wall.
    Feed {
        #[arg(long, default_value = "all")]
        category: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show your own inspirations.
    Mine {
        #[arg(long, default_value = "all")]
        category: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Login {
        email: String,
        #[arg(long, env = "WALL_PASSWORD")]
        password: String,
    },
    Signup {
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "WALL_PASSWORD")]
        password: String,
        #[arg(long, env = "WALL_CONFIRM_PASSWORD")]
        confirm_password: String,
    },
    Logout,
    /// Capture a new inspiration.
    Add {
        content: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "", help = "Comma-separated tags")]
        tags: String,
        #[arg(long, value_enum, default_value_t = VisibilityArg::Private)]
        visibility: VisibilityArg,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Delete {
        id: String,
    },
    /// Save a pixel avatar; random when no DNA is given.
    Avatar {
        dna: Option<String>,
    },
    /// Keep a view open. Each stdin line `hidden` or `visible` is a
    /// visibility change; EOF ends the session.
    Watch {
        #[arg(long, default_value_t = false)]
        mine: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Private,
    Public,
}

impl From<VisibilityArg> for Visibility {
    fn from(value: VisibilityArg) -> Self {
        match value {
            VisibilityArg::Private => Self::Private,
            VisibilityArg::Public => Self::Public,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = WallConfig::from_env()?;

    match cli.command {
        Command::Feed { category, json } => run_list(config, View::PublicWall, &category, json).await,
        Command::Mine { category, json } => run_list(config, View::Dashboard, &category, json).await,
        Command::Login { email, password } => {
            let app = WallApp::from_config(config, View::PublicWall)?;
            let user = app.accounts().sign_in(&SignInForm { email, password }).await?;
            println!("signed in as {}", user.id);
            Ok(())
        }
        Command::Signup { email, username, password, confirm_password } => {
            let app = WallApp::from_config(config, View::PublicWall)?;
            let form = SignUpForm { email, username, password, confirm_password };
            match app.accounts().sign_up(&form).await? {
                SignUpOutcome::SignedIn(user) => println!("registered and signed in as {}", user.id),
                SignUpOutcome::ConfirmationRequired => println!("check your inbox to confirm the account"),
            }
            Ok(())
        }
        Command::Logout => {
            let app = WallApp::from_config(config, View::PublicWall)?;
            app.accounts().sign_out().await?;
            println!("signed out");
            Ok(())
        }
        Command::Add { content, category, description, tags, visibility, image } => {
            let image = image.map(read_image).transpose()?;
            let mut draft = InspirationDraft {
                content,
                description,
                tags,
                category,
                visibility: visibility.into(),
                image,
            };
            run_add(config, &mut draft).await
        }
        Command::Delete { id } => {
            let mut app = WallApp::from_config(config, View::Dashboard)?;
            ensure_signed_in(app.start().await)?;
            app.delete(&id).await?;
            println!("deleted {id}");
            Ok(())
        }
        Command::Avatar { dna } => {
            let app = WallApp::from_config(config, View::PublicWall)?;
            let dna = dna.unwrap_or_else(random_dna);
            let avatar = app.accounts().save_pixel_avatar(&dna).await?;
            println!("avatar saved: {avatar}");
            Ok(())
        }
        Command::Watch { mine } => {
            let view = if mine { View::Dashboard } else { View::PublicWall };
            run_watch(config, view).await
        }
    }
}

fn ensure_signed_in(effect: AppEffect) -> Result<(), CliError> {
    match effect {
        AppEffect::RedirectHome => Err(WallError::NotSignedIn.into()),
        _ => Ok(()),
    }
}

async fn run_list(config: WallConfig, view: View, category: &str, json: bool) -> Result<(), CliError> {
    let mut app = WallApp::from_config(config, view)?;
    let effect = app.start().await;
    if view == View::Dashboard {
        ensure_signed_in(effect.clone())?;
    }
    if let AppEffect::Reloaded(LoadOutcome::Failed(e)) = effect {
        return Err(CliError::Load(e.user_message().to_owned()));
    }
    app.select_category(CategoryFilter::parse(category));

    if json {
        println!("{}", serde_json::to_string_pretty(app.visible_items())?);
        return Ok(());
    }
    print_cards(&app);
    if view == View::Dashboard {
        let stats = app.stats();
        println!("total {} / public {} / private {}", stats.total, stats.public, stats.private);
    }
    Ok(())
}

fn print_cards(app: &WallApp) {
    let now = OffsetDateTime::now_utc();
    let cards = app.cards(now);
    if cards.is_empty() {
        println!("(nothing here yet)");
    }
    for card in cards {
        let marker = if card.public { "public" } else { "private" };
        println!("[{}] {} · {} · {} · {marker}", card.id, card.author, card.category, card.posted);
        if let Some(description) = &card.description {
            println!("  {description}");
        }
        println!("  {}", card.content);
        if !card.tags.is_empty() {
            println!("  #{}", card.tags.join(" #"));
        }
        if let Some(url) = &card.image_url {
            println!("  image: {url}");
        }
    }
}

async fn run_add(config: WallConfig, draft: &mut InspirationDraft) -> Result<(), CliError> {
    let mut app = WallApp::from_config(config, View::Dashboard)?;
    ensure_signed_in(app.start().await)?;
    if draft.category.is_none() {
        eprintln!("pick a category with --category: {}", DEFAULT_CATEGORIES.join(", "));
    }
    let created = app.create(draft, &ask_continue_without_image).await?;
    if created.image_skipped {
        eprintln!("saved without the image");
    }
    if let Some(url) = created.image_url {
        println!("image: {url}");
    }
    println!("saved");
    Ok(())
}

fn ask_continue_without_image(error: &WallError) -> bool {
    eprint!("{error}. Save without the image? [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn read_image(path: PathBuf) -> Result<ImageUpload, CliError> {
    let bytes = std::fs::read(&path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = content_type_for(&file_name).to_owned();
    Ok(ImageUpload { file_name, content_type, bytes })
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn run_watch(config: WallConfig, view: View) -> Result<(), CliError> {
    let mut app = WallApp::from_config(config, view)?;
    let effect = app.start().await;
    report(&app, &effect);

    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let visibility = match line.trim() {
                "hidden" => PageVisibility::Hidden,
                "visible" => PageVisibility::Visible,
                other => {
                    eprintln!("unknown input {other:?}, expected hidden or visible");
                    continue;
                }
            };
            if tx.blocking_send(visibility).is_err() {
                break;
            }
        }
    });

    app.run(rx, report).await?;
    Ok(())
}

fn report(app: &WallApp, effect: &AppEffect) {
    match effect {
        AppEffect::None => {}
        AppEffect::Reloaded(LoadOutcome::Committed { count }) => {
            eprintln!("loaded {count} inspirations");
            print_cards(app);
        }
        AppEffect::Reloaded(LoadOutcome::Failed(e)) => eprintln!("{}", e.user_message()),
        AppEffect::Reloaded(LoadOutcome::Discarded) => {}
        AppEffect::ReloadScheduled => eprintln!("data is stale, refreshing shortly"),
        AppEffect::PageReload => {
            eprintln!("reconnected");
            print_cards(app);
        }
        AppEffect::RedirectHome => {
            eprintln!("signed out, showing the public wall");
            print_cards(app);
        }
    }
}
