use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use diffusion_gallery::client::{ApiClient, ApiResult, JsonFileStorage, LocalApiClient, UserState};
use diffusion_gallery::database::{Database, IntoFields, Query};
use diffusion_gallery::host::AppHost;
use diffusion_gallery::models::{AppUser, CreativeArtifact, NewAppUser, Session, ROLE_ADMIN};
use diffusion_gallery::services::UpdateUserProfile;
use diffusion_gallery::utils::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Act as this user.
    #[arg(short, long, global = true)]
    user: Option<i64>,

    /// Overrides DATABASE_PATH.
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and register a user.
    Init {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        admin: bool,
    },
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Recent creatives, newest first.
    Creatives {
        #[arg(long)]
        owner: Option<i64>,
        #[arg(long, default_value_t = 28)]
        take: usize,
    },
    Artifacts {
        creative_id: i64,
    },
    Like {
        artifact_id: i64,
    },
    Unlike {
        artifact_id: i64,
    },
    Likes,
    DeleteCreative {
        creative_id: i64,
    },
    /// Show the CORS headers an origin would receive, plus the host's cookie settings.
    CorsCheck {
        origin: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn into_result<T>(api: ApiResult<T>) -> Result<Option<T>> {
    if let Some(status) = api.error {
        bail!("{}: {}", status.error_code, status.message);
    }
    Ok(api.response)
}

fn session_for(db: &Database, user: Option<i64>) -> Result<Option<Session>> {
    let Some(user_id) = user else {
        return Ok(None);
    };
    let found = db
        .repo::<AppUser>()
        .get(user_id)?
        .with_context(|| format!("No user with id {user_id}"))?;
    Ok(Some(Session {
        user_id: found.id,
        roles: found.roles,
    }))
}

fn require_user(user: Option<i64>) -> Result<i64> {
    user.context("This command needs --user")
}

async fn toggle_like<C: ApiClient>(
    mut state: UserState<C>,
    user_id: i64,
    artifact_id: i64,
    like: bool,
) -> Result<()> {
    state.load_likes(user_id).await;
    let artifact = state
        .get_artifact(artifact_id)
        .await
        .with_context(|| format!("No artifact with id {artifact_id}"))?;
    if like {
        into_result(state.like_artifact(artifact).await)?;
    } else {
        into_result(state.unlike_artifact(artifact).await)?;
    }
    println!("liked: {}", state.has_liked(artifact_id));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(path) = args.db_path {
        config.database_path = path;
    }

    let prefs_path = config.database_path.with_extension("prefs.json");
    let db = Arc::new(Database::open(&config.database_path)?);
    let host = AppHost::build(config, db.clone(), None)?;
    let services = Arc::new(host.services.clone());
    let session = session_for(&db, args.user)?;
    let client = LocalApiClient::new(services.clone(), session);

    match args.command {
        Command::Init {
            display_name,
            email,
            admin,
        } => {
            let roles = if admin {
                vec![ROLE_ADMIN.to_string()]
            } else {
                Vec::new()
            };
            let user: AppUser = db.repo::<AppUser>().create(
                NewAppUser {
                    email,
                    display_name,
                    roles,
                }
                .into_fields(),
            )?;
            info!("Registered user {}", user.id);
            print_json(&user)?;
        }
        Command::Profile { action } => {
            let profile = match action {
                ProfileAction::Show => client.get_user_profile().await,
                ProfileAction::Update {
                    display_name,
                    handle,
                    avatar,
                } => {
                    client
                        .update_user_profile(UpdateUserProfile {
                            display_name,
                            handle,
                            avatar,
                        })
                        .await
                }
            };
            print_json(&into_result(profile)?)?;
        }
        Command::Creatives { owner, take } => {
            let mut query = Query::new().take(take).order_by_desc("id");
            if let Some(owner) = owner {
                query = query.filter("owner_id", owner);
            }
            print_json(&services.creatives.query_creatives(&query)?)?;
        }
        Command::Artifacts { creative_id } => {
            let query = Query::new().filter("creative_id", creative_id);
            print_json(&services.creatives.query_artifacts(&query)?)?;
        }
        Command::Like { artifact_id } => {
            let state = UserState::new(client, Arc::new(JsonFileStorage::new(prefs_path)));
            toggle_like(state, require_user(args.user)?, artifact_id, true).await?;
        }
        Command::Unlike { artifact_id } => {
            let state = UserState::new(client, Arc::new(JsonFileStorage::new(prefs_path)));
            toggle_like(state, require_user(args.user)?, artifact_id, false).await?;
        }
        Command::Likes => {
            let user_id = require_user(args.user)?;
            let mut state = UserState::new(client, Arc::new(JsonFileStorage::new(prefs_path)));
            state.load_likes(user_id).await;
            let artifacts = state.liked_artifacts();
            let liked: Vec<&CreativeArtifact> = artifacts.iter().map(|a| a.as_ref()).collect();
            print_json(&liked)?;
        }
        Command::DeleteCreative { creative_id } => {
            let user_id = require_user(args.user)?;
            let mut state = UserState::new(client, Arc::new(JsonFileStorage::new(prefs_path)));
            state.load(user_id).await;
            if state.get_creative(creative_id).await.is_none() {
                bail!("No creative with id {creative_id}");
            }
            into_result(state.hard_delete_creative_by_id(creative_id).await)?;
            info!("Deleted creative {}", creative_id);
        }
        Command::CorsCheck { origin } => {
            match host.cors.response_headers(&origin) {
                Some(headers) => {
                    for (name, value) in headers {
                        println!("{name}: {value}");
                    }
                }
                None => println!("{origin} is not an allowed origin"),
            }
            println!("same-site cookies: {}", host.host.use_same_site_cookies);
            println!(
                "redirect params in query string: {}",
                host.host.add_redirect_params_to_query_string
            );
        }
    }

    Ok(())
}
