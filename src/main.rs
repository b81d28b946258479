use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use kiosk::api::types::Article;
use kiosk::api::{news, users, ApiClient};
use kiosk::pager::{Feed, LoadOutcome, NewsFeedPager};
use kiosk::subscriptions::{DisplayState, SubscriptionReconciler};
use kiosk::{Config, TokenStore};

/// Get the config directory path (~/.config/kiosk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("kiosk");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "kiosk", about = "Terminal client for a news aggregation service")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Discard the stored session
    Logout,
    /// Check whether the stored session is still valid
    Status,
    /// List articles, newest first
    Feed {
        /// Walk the subscribed-sources feed instead of the general one
        #[arg(long)]
        subscribed: bool,
        /// How many pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show one article and record the read
    Read {
        /// Article id
        id: String,
    },
    /// List all news sources with subscription markers
    Sources,
    /// Toggle subscriptions for one or more sources and apply the changes
    Toggle {
        /// Source ids to toggle
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Look up the account id for an email address
    FindId {
        #[arg(long)]
        email: String,
    },
    /// Start a password reset for an email address
    ResetPassword {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Credentials live under here; keep the directory user-only on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config =
        Config::load(&config_dir.join("config.toml")).context("Failed to load configuration")?;
    let store = Arc::new(
        TokenStore::open(config_dir.join("credentials.json"))
            .context("Failed to open credential store")?,
    );
    let client = ApiClient::new(&config, store)?;

    match args.command {
        Command::Login { email, password } => {
            let response = users::login(&client, &email, &password)
                .await
                .context("Login failed")?;
            println!(
                "{}",
                response.message.as_deref().unwrap_or("Login successful")
            );
        }

        Command::Signup { email, password } => {
            let created = users::signup(&client, &email, &password)
                .await
                .context("Signup failed")?;
            println!("Account created for {} (id {})", created.email, created.user_id);
            println!("Run `kiosk login` to start a session.");
        }

        Command::Logout => {
            client.store().clear().context("Failed to clear session")?;
            println!("Logged out.");
        }

        Command::Status => {
            if !client.store().is_logged_in() {
                println!("Not logged in.");
                return Ok(());
            }
            let check = users::check_token(&client)
                .await
                .context("Token check failed")?;
            if check.valid {
                println!("Session is valid.");
            } else {
                println!(
                    "Session is not valid: {}",
                    check.detail.as_deref().unwrap_or("token rejected")
                );
            }
        }

        Command::Feed { subscribed, pages } => {
            let feed = if subscribed { Feed::Subscribed } else { Feed::All };
            let mut pager = NewsFeedPager::new(feed, config.page_size, config.sort.clone());

            for _ in 0..pages {
                match pager.load_next(&client).await.context("Feed fetch failed")? {
                    LoadOutcome::Loaded { .. } => {}
                    LoadOutcome::Skipped => break,
                }
            }

            if pager.items().is_empty() {
                println!("No articles.");
            } else {
                for article in pager.items() {
                    print_headline(article);
                }
                if !pager.has_more() {
                    println!("(end of feed)");
                }
            }
        }

        Command::Read { id } => {
            let article = news::fetch_detail(&client, &id)
                .await
                .context("Failed to fetch article")?;
            print_detail(&article);

            // Analytics only; a failure must not spoil the read
            if let Err(e) = users::record_click(&client, &id).await {
                tracing::warn!(news_id = %id, error = %e, "Failed to record click event");
            }
        }

        Command::Sources => {
            let sources = news::fetch_sources(&client)
                .await
                .context("Failed to fetch source catalog")?;
            let reconciler = SubscriptionReconciler::load(&client)
                .await
                .context("Failed to fetch subscriptions")?;

            for source in &sources {
                let marker = match reconciler.display_state(&source.source) {
                    DisplayState::Active => "[*]",
                    DisplayState::Inactive => "[ ]",
                };
                match &source.description {
                    Some(description) => {
                        println!("{} {} — {}", marker, source.source, description)
                    }
                    None => println!("{} {}", marker, source.source),
                }
            }
        }

        Command::Toggle { sources } => {
            let catalog = news::fetch_sources(&client)
                .await
                .context("Failed to fetch source catalog")?;
            let mut reconciler = SubscriptionReconciler::load(&client)
                .await
                .context("Failed to fetch subscriptions")?;

            for source_id in &sources {
                if !catalog.iter().any(|s| s.source == *source_id) {
                    tracing::warn!(source = %source_id, "Unknown source, skipping");
                    eprintln!("Unknown source '{}', skipping.", source_id);
                    continue;
                }
                reconciler.toggle(source_id);
            }

            if !reconciler.has_pending() {
                println!("Nothing to change.");
                return Ok(());
            }

            let report = reconciler.commit(&client).await;
            println!("Applied {} change(s).", report.succeeded);
            for failure in &report.failures {
                eprintln!("  {}: {}", failure.source_id, failure.message);
            }
            if !report.all_succeeded() {
                anyhow::bail!(
                    "{} change(s) failed and remain pending; rerun to retry",
                    report.failures.len()
                );
            }
        }

        Command::FindId { email } => {
            let found = users::find_user_id(&client, &email)
                .await
                .context("Account lookup failed")?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }

        Command::ResetPassword { email } => {
            let response = users::reset_password(&client, &email)
                .await
                .context("Password reset failed")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn print_headline(article: &Article) {
    let title = article.title.as_deref().unwrap_or("(untitled)");
    match &article.published_at {
        Some(published) => println!("{}  {:12}  {}  ({})", article.id, article.source, title, published),
        None => println!("{}  {:12}  {}", article.id, article.source, title),
    }
}

fn print_detail(article: &Article) {
    println!("{}", article.title.as_deref().unwrap_or("(untitled)"));
    println!("source: {}", article.source);
    if let Some(author) = &article.author {
        println!("author: {}", author);
    }
    if let Some(published) = &article.published_at {
        println!("published: {}", published);
    }
    if let Some(url) = &article.url {
        println!("url: {}", url);
    }
    if let Some(description) = &article.description {
        println!("\n{}", description);
    }
}
