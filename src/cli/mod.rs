//! Command-line front end
//!
//! Every command prints its result as pretty JSON on stdout; logs go to
//! stderr.

pub mod args;
pub mod prompt;

pub use args::{Cli, Command, ListArgs, UploadArgs, UploadTarget};
pub use prompt::StdinCodeProvider;

use crate::config::{ConfigLoader, Settings};
use crate::ops::read::shortcode_from_url;
use crate::{AuthState, UserRef, WebClient};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load configuration, set up logging and run one command
pub async fn run(cli: Cli) -> Result<()> {
    let settings = ConfigLoader::new()
        .load(cli.config.as_deref())
        .context("failed to load configuration")?;
    init_logging(&settings, cli.verbose);

    tracing::debug!("Running {:?}", cli.command);
    let client = WebClient::new(settings)?;

    match cli.command {
        Command::Login { username } => {
            let username = username
                .or_else(|| client.settings().credentials.username.clone())
                .context("no username given (use --username or IG_USERNAME)")?;
            let password = client
                .settings()
                .credentials
                .password
                .clone()
                .context("IG_PASSWORD is not set")?;
            let identity = client.login(&username, &password, &StdinCodeProvider).await?;
            print_json(&identity)
        }
        Command::Logout => {
            client.restore_session().await?;
            client.logout().await?;
            print_json(&serde_json::json!({ "status": "logged_out" }))
        }
        Command::Stats => print_json(&client.get_stats()),
        command => {
            connect(&client).await?;
            run_authenticated(&client, command).await
        }
    }
}

async fn run_authenticated(client: &WebClient, command: Command) -> Result<()> {
    match command {
        Command::Profile { username } => {
            let profile = client
                .get_profile(&username)
                .await?
                .with_context(|| format!("no such account: {username}"))?;
            print_json(&profile)
        }
        Command::Account => {
            let profile = client
                .get_account_info()
                .await?
                .context("the logged-in account has no public profile")?;
            print_json(&profile)
        }
        Command::Stories {
            username,
            mark_seen,
        } => {
            let id = user_id(client, &username).await?;
            let stories = client.list_user_stories(id).await?;
            if mark_seen && !stories.is_empty() {
                let outcome = client.mark_stories_seen(&stories).await?;
                tracing::info!("Marked {} stories seen: {:?}", stories.len(), outcome);
            }
            print_json(&stories)
        }
        Command::Followers(args) => {
            let id = user_id(client, &args.username).await?;
            print_json(&client.list_followers(id, args.amount).await?)
        }
        Command::Following(args) => {
            let id = user_id(client, &args.username).await?;
            print_json(&client.list_following(id, args.amount).await?)
        }
        Command::Media(args) => {
            let id = user_id(client, &args.username).await?;
            print_json(&client.list_user_media(id, args.amount).await?)
        }
        Command::Likers { post, amount } => {
            let shortcode = shortcode_from_url(&post).unwrap_or(post);
            print_json(&client.list_media_likers(&shortcode, amount).await?)
        }
        Command::Hashtag { tag, amount } => {
            print_json(&client.list_hashtag_media(&tag, amount).await?)
        }
        Command::Search { query, amount } => {
            print_json(&client.search_users(&query, amount).await?)
        }
        Command::Follow { user } => print_json(&client.follow_user(UserRef::from(user)).await?),
        Command::Unfollow { user } => {
            print_json(&client.unfollow_user(UserRef::from(user)).await?)
        }
        Command::Like { post } => {
            let id = media_id(client, &post).await?;
            print_json(&client.like_media(id).await?)
        }
        Command::Unlike { post } => {
            let id = media_id(client, &post).await?;
            print_json(&client.unlike_media(id).await?)
        }
        Command::Comment { post, text } => {
            let id = media_id(client, &post).await?;
            print_json(&client.comment_on_media(id, &text).await?)
        }
        Command::Upload(args) => {
            let thumbnail = args.thumbnail.as_deref();
            let published = match args.target {
                UploadTarget::Photo => client.upload_photo_to_feed(&args.path, &args.caption).await?,
                UploadTarget::Video => {
                    client
                        .upload_video_to_feed(&args.path, &args.caption, thumbnail)
                        .await?
                }
                UploadTarget::StoryPhoto => client.upload_photo_to_story(&args.path).await?,
                UploadTarget::StoryVideo => {
                    client.upload_video_to_story(&args.path, thumbnail).await?
                }
                UploadTarget::Clip => {
                    client
                        .upload_clip(&args.path, &args.caption, thumbnail)
                        .await?
                }
            };
            print_json(&published)
        }
        Command::Login { .. } | Command::Logout | Command::Stats => {
            bail!("command does not need a session")
        }
    }
}

/// Restore the stored session, logging in with configured credentials if needed
async fn connect(client: &WebClient) -> Result<()> {
    if let AuthState::Authenticated(identity) = client.restore_session().await? {
        tracing::debug!("Using stored session for {}", identity.username);
        return Ok(());
    }

    let credentials = &client.settings().credentials;
    match (&credentials.username, &credentials.password) {
        (Some(username), Some(password)) => {
            client.login(username, password, &StdinCodeProvider).await?;
            Ok(())
        }
        _ => bail!("no stored session; run `gramweb login` or set IG_USERNAME and IG_PASSWORD"),
    }
}

async fn user_id(client: &WebClient, username: &str) -> Result<u64> {
    let username = username.trim_start_matches('@');
    let profile = client
        .get_profile(username)
        .await?
        .with_context(|| format!("no such account: {username}"))?;
    Ok(profile.id)
}

/// Media id from a numeric id, a post URL or a bare shortcode
async fn media_id(client: &WebClient, post: &str) -> Result<u64> {
    if let Ok(id) = post.parse::<u64>() {
        return Ok(id);
    }
    let resolved = if post.contains("://") {
        client.resolve_post_url(post).await
    } else {
        client.resolve_shortcode_to_id(post).await
    };
    resolved.with_context(|| format!("could not resolve post {post}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(settings: &Settings, verbose: bool) {
    let level = if verbose || settings.logging.verbose {
        "debug".to_string()
    } else {
        settings.logging.level.clone()
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gramweb={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
