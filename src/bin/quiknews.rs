use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quiknews::auth::oauth::{GoogleOAuth, IdentityProvider, OAuthRefresher, OAuthSettings};
use quiknews::auth::token_store;
use quiknews::cloud::metadata::ServiceTokenSource;
use quiknews::cloud::storage::{GcsObjectStore, ObjectStore};
use quiknews::cloud::tasks::{CloudTasksQueue, TaskQueue};
use quiknews::config::{self, Config};
use quiknews::mail::gmail_client::GmailConnector;
use quiknews::podcast::HttpPodcastGenerator;
use quiknews::store::repo::CredentialStore;
use quiknews::store::sqlite::SqliteRepo;
use quiknews::task::{DigestRunner, DigestTask};
use quiknews::web::routes::{App, AppParts};
use quiknews::web::serve;
use quiknews::web::session::SessionCodec;

#[derive(Parser)]
#[command(name = "quiknews")]
#[command(about = "Turns the day's newsletters into a podcast", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web app
    Serve {
        /// Address to listen on (default 0.0.0.0:$PORT)
        #[arg(long)]
        bind: Option<String>,

        /// Open the app in a browser once listening
        #[arg(long)]
        open: bool,
    },

    /// Build, generate and upload today's digest for every stored identity
    RunDigest,

    /// Queue a digest run on Cloud Tasks
    Enqueue,

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Serve { bind, open } => {
            let cfg = load()?;
            let bind = bind.unwrap_or_else(|| format!("0.0.0.0:{}", cfg.port()));

            let store = open_store(&cfg)?;
            let objects: Arc<dyn ObjectStore> = Arc::new(object_store(&cfg)?);
            let oauth = identity_provider(&cfg)?;
            if oauth.is_none() {
                warn!("no OAuth client configured; /login will fail until one is set");
            }

            let app = App::new(AppParts {
                oauth,
                store: store.clone(),
                objects: objects.clone(),
                queue: Box::new(task_queue(&cfg)?),
                digest: Box::new(digest_task(&cfg, store, objects)?),
                sessions: SessionCodec::new(cfg.session_secret().as_bytes(), cfg.secure_cookies()),
                static_dir: cfg.static_dir(),
            });

            let running = Arc::new(AtomicBool::new(true));
            let r2 = running.clone();
            ctrlc::set_handler(move || {
                r2.store(false, Ordering::SeqCst);
            })?;

            if open {
                let url = format!("http://{}", bind.replace("0.0.0.0", "127.0.0.1"));
                if let Err(e) = open::that(&url) {
                    warn!("could not open browser at {url}: {e}");
                }
            }

            serve(&app, &bind, &running)
        }

        Command::RunDigest => {
            let cfg = load()?;
            let store = open_store(&cfg)?;
            let objects: Arc<dyn ObjectStore> = Arc::new(object_store(&cfg)?);
            let report = digest_task(&cfg, store, objects)?.run_batch()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Command::Enqueue => {
            let cfg = load()?;
            let name = task_queue(&cfg)?.enqueue_digest()?;
            info!("enqueued {name}");
            println!("Enqueued {name}");
            Ok(())
        }
    }
}

fn load() -> Result<Config> {
    config::load().map_err(|e| anyhow!("Configuration error: {e}"))
}

fn open_store(cfg: &Config) -> Result<Arc<dyn CredentialStore>> {
    Ok(Arc::new(SqliteRepo::open(&cfg.db_path()?)?))
}

fn http_client(cfg: &Config) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(cfg.http_timeout())
        .build()?)
}

fn identity_provider(cfg: &Config) -> Result<Option<Box<dyn IdentityProvider>>> {
    let Some((client_id, client_secret)) = cfg.oauth_client() else {
        return Ok(None);
    };
    let settings = OAuthSettings {
        client_id,
        client_secret,
        redirect_uri: cfg.redirect_uri().to_string(),
    };
    let provider: Box<dyn IdentityProvider> =
        Box::new(GoogleOAuth::new(settings, http_client(cfg)?));
    Ok(Some(provider))
}

fn service_tokens(cfg: &Config) -> ServiceTokenSource {
    ServiceTokenSource::from_config(cfg.service_token.as_deref())
}

fn object_store(cfg: &Config) -> Result<GcsObjectStore> {
    GcsObjectStore::new(cfg.bucket(), service_tokens(cfg), cfg.http_timeout())
}

fn task_queue(cfg: &Config) -> Result<CloudTasksQueue> {
    CloudTasksQueue::new(
        cfg.tasks_queue(),
        cfg.task_handler_url()?,
        service_tokens(cfg),
        cfg.http_timeout(),
    )
}

fn digest_task(
    cfg: &Config,
    store: Arc<dyn CredentialStore>,
    objects: Arc<dyn ObjectStore>,
) -> Result<DigestTask> {
    Ok(DigestTask::new(
        store,
        Box::new(OAuthRefresher),
        Box::new(GmailConnector::new(cfg.http_timeout())?),
        Box::new(
            HttpPodcastGenerator::new(cfg.podcast_endpoint(), cfg.generation_timeout())?
                .with_models(cfg.llm_model(), cfg.tts_model()),
        ),
        objects,
        cfg.digest_settings(),
    ))
}
