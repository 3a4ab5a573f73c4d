//! catalog-client - command-line front end for the library catalog API

use anyhow::{bail, Context};
use chrono::Utc;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_client::{
    models::{LoginCredentials, RegisterProfile},
    services::catalog::{CatalogQuery, SortKey, SortOrder},
    signals::Signal,
    CatalogClient, ClientConfig,
};

const DEFAULT_SESSION_FILE: &str = ".catalog-client/session.json";

const USAGE: &str = "usage: catalog-client <command> [args]

commands:
  status                                  show the stored session
  check-email <email>                     is the email still free to register
  register <first> <last> <email> <pw>    create an account
  send-code <email>                       email a one-time login code
  login <email> <password> <code>         log in with the emailed code
  logout                                  forget the stored session
  me                                      show the logged-in user
  books [text] [--genre G] [--available] [--sort title|author|year|availability] [--desc] [--page N]
  genres                                  list genres
  dashboard                               profile and borrow summary";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    if config.storage.path.is_none() {
        config.storage.path = Some(DEFAULT_SESSION_FILE.to_string());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("catalog_client={}", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!("catalog-client v{} against {}", env!("CARGO_PKG_VERSION"), config.api.base_url);

    let client = CatalogClient::new(config)?;

    let mut signals = client.signals().stream();
    tokio::spawn(async move {
        while let Some(signal) = signals.next().await {
            match signal {
                Signal::NetworkUnreachable { url } => {
                    eprintln!("! API unreachable ({})", url.unwrap_or_default())
                }
                Signal::SessionExpired { .. } => eprintln!("! Session expired, please log in again"),
                Signal::AccessDenied { url } => {
                    eprintln!("! Access denied ({})", url.unwrap_or_default())
                }
            }
        }
    });

    // Restoring may legitimately fail (no session yet); commands decide what they need
    if let Err(e) = client.services.auth.check_auth() {
        tracing::debug!("No session restored: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    run(&client, command, &args[1..]).await
}

async fn run(client: &CatalogClient, command: &str, args: &[String]) -> anyhow::Result<()> {
    let services = &client.services;

    match (command, args) {
        ("status", []) => {
            let session = client.session();
            match session.user() {
                Some(user) if session.is_authenticated() => {
                    println!("Logged in as {}", user.display_name())
                }
                _ if session.is_authenticated() => println!("Logged in"),
                _ => println!("Not logged in"),
            }
        }
        ("check-email", [email]) => {
            if services.auth.check_email_available(email).await? {
                println!("{} is available", email);
            } else {
                println!("{} is already registered", email);
            }
        }
        ("register", [first, last, email, password]) => {
            let registered = services
                .auth
                .register(RegisterProfile {
                    first_name: first.clone(),
                    last_name: last.clone(),
                    email: email.clone(),
                    password: password.clone(),
                    phone: None,
                })
                .await?;
            println!("Registered {}. Request a login code with `send-code`.", registered.email);
        }
        ("send-code", [email]) => {
            services.auth.request_verification_code(email).await?;
            println!("A login code was sent to {}", email);
        }
        ("login", [email, password, code]) => {
            let session = services
                .auth
                .login(LoginCredentials::new(email.as_str(), password.as_str(), code.as_str()))
                .await?;
            let name = session.user().map(|u| u.display_name()).unwrap_or_default();
            println!("Welcome {}", name);
        }
        ("logout", []) => {
            services.auth.logout();
            println!("Logged out");
        }
        ("me", []) => {
            let user = services.auth.current_user().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        ("books", rest) => {
            let query = parse_book_query(rest)?;
            let page = services.catalog.search(&query).await?;
            for book in &page.items {
                println!(
                    "{:<40} {:<25} {:>4} {}",
                    book.title,
                    book.author.as_deref().unwrap_or("-"),
                    book.year.map(|y| y.to_string()).unwrap_or_default(),
                    if book.is_available() { "" } else { "(out)" }
                );
            }
            println!("-- page {}/{} ({} books)", page.page, page.page_count().max(1), page.total);
        }
        ("genres", []) => {
            for genre in services.catalog.list_genres().await? {
                println!("{}", genre.name);
            }
        }
        ("dashboard", []) => {
            let summary = services.dashboard.summary(Utc::now()).await?;
            println!("{}", summary.user.display_name());
            println!(
                "{} active, {} overdue, {} returned",
                summary.active_borrows, summary.overdue_borrows, summary.returned_borrows
            );
        }
        _ => {
            println!("{}", USAGE);
            bail!("unknown command or wrong arguments: {}", command);
        }
    }

    Ok(())
}

fn parse_book_query(args: &[String]) -> anyhow::Result<CatalogQuery> {
    let mut query = CatalogQuery::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--genre" => query.genre = Some(args.next().context("--genre needs a value")?.clone()),
            "--available" => query.available_only = true,
            "--desc" => query.order = SortOrder::Desc,
            "--sort" => {
                query.sort = match args.next().map(String::as_str) {
                    Some("title") => SortKey::Title,
                    Some("author") => SortKey::Author,
                    Some("year") => SortKey::Year,
                    Some("availability") => SortKey::Availability,
                    other => bail!("unknown sort key: {:?}", other),
                }
            }
            "--page" => {
                let page = args.next().context("--page needs a value")?;
                query.page = Some(page.parse().context("--page must be a number")?);
            }
            text => query.text = Some(text.to_string()),
        }
    }

    Ok(query)
}
