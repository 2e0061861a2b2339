//! sgc-client - command-line driver for the SGC client core
//!
//! Each subcommand opens an [`AppSession`], runs one operation and closes it.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sgc_client::models::{HeadshotStyle, PreviewRequest};
use sgc_client::services::UnlockOutcome;
use sgc_client::{AppSession, CliOverrides, ClientConfig};
use sgc_common::events::CaptureSlot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sgc-client
#[derive(Parser, Debug)]
#[command(name = "sgc-client")]
#[command(about = "Style analysis client")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config dir>/sgc/sgc-client.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the local store and captures
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a phone number and sign in
    Login {
        #[arg(long)]
        phone: String,
    },
    /// Sign out, keeping analysis data
    Logout,
    /// Capture three photos and run the identity analysis
    Analyze {
        #[arg(long)]
        face: PathBuf,
        #[arg(long)]
        body: PathBuf,
        #[arg(long)]
        skin: PathBuf,
    },
    /// Show premium, tier and analysis status
    Status,
    /// Send one message to the stylist
    Chat { message: String },
    /// Generate outfit and headshot previews for the stored analysis
    Previews,
    /// Unlock premium access with a membership email
    Unlock {
        #[arg(long)]
        email: String,
    },
    /// Show today's transformation task
    Task {
        /// Mark today's task as done
        #[arg(long)]
        done: bool,
    },
    /// Reset the analysis (test accounts)
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = sgc_common::config::load_toml_config(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sgc_client={0},sgc_common={0}", toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("SGC_GIT_COMMIT"),
        built_at = env!("SGC_BUILT_AT"),
        profile = env!("SGC_BUILD_PROFILE"),
        "Starting sgc-client"
    );

    let overrides = CliOverrides {
        backend_url: args.backend_url.clone(),
        data_folder: args.data_folder.clone(),
    };
    let config = ClientConfig::resolve(&overrides, &toml_config)
        .context("Failed to resolve configuration")?;

    let session = AppSession::start(config)
        .await
        .context("Failed to start session")?;

    let outcome = run(&session, args.command).await;
    session.close().await;
    outcome
}

async fn run(session: &AppSession, command: Command) -> Result<()> {
    match command {
        Command::Login { phone } => login(session, &phone).await,
        Command::Logout => {
            session.sign_out().await?;
            println!("Signed out");
            Ok(())
        }
        Command::Analyze { face, body, skin } => analyze(session, face, body, skin).await,
        Command::Status => {
            let status = session.resolve_status().await;
            println!("premium:           {}", status.is_premium);
            println!("membership tier:   {}", status.membership_tier);
            println!("analysis complete: {}", status.has_completed_analysis);
            Ok(())
        }
        Command::Chat { message } => {
            match session.chat().send(&message).await {
                Some(reply) => println!("{}", reply.content),
                None => println!("(empty message ignored)"),
            }
            Ok(())
        }
        Command::Previews => previews(session).await,
        Command::Unlock { email } => {
            match session.membership().unlock(&email).await? {
                UnlockOutcome::ShowResults { tier } => {
                    println!("Unlocked ({}). Your results are ready.", tier)
                }
                UnlockOutcome::StartAnalysis { tier } => {
                    println!("Unlocked ({}). Run `sgc-client analyze` next.", tier)
                }
            }
            Ok(())
        }
        Command::Task { done } => task(session, done).await,
        Command::Reset => {
            if let Some(mode) = session.reset().mode().await {
                println!(
                    "test mode: {}, remaining regenerations: {}",
                    mode.is_test_mode, mode.remaining_regenerations
                );
            }
            session.reset().force_reset().await?;
            println!("Analysis reset");
            Ok(())
        }
    }
}

async fn login(session: &AppSession, phone: &str) -> Result<()> {
    let auth = session.phone_auth();
    auth.request_code(phone).await?;

    print!("Verification code: ");
    std::io::stdout().flush()?;
    let mut code = String::new();
    std::io::stdin().lock().read_line(&mut code)?;

    let user = auth.confirm_code(code.trim()).await?;
    session.sign_in(&user).await?;
    println!("Signed in as {}", user.phone);
    Ok(())
}

async fn analyze(session: &AppSession, face: PathBuf, body: PathBuf, skin: PathBuf) -> Result<()> {
    session
        .analysis()
        .record_captures(&[
            (CaptureSlot::Face, face),
            (CaptureSlot::Body, body),
            (CaptureSlot::Skin, skin),
        ])
        .await?;

    match session.analysis().execute().await {
        Ok(result) => {
            let identity = result.identity();
            println!("Identity unlocked!");
            println!("face shape:       {}", identity.face_shape.unwrap_or_default());
            println!("body type:        {}", identity.body_type.unwrap_or_default());
            println!("skin tone:        {}", identity.skin_tone.unwrap_or_default());
            println!("seasonal palette: {}", identity.seasonal_palette.unwrap_or_default());
            Ok(())
        }
        Err(err) => {
            if let Err(e) = session.analysis().restart().await {
                tracing::warn!(error = %e, "Failed to reset analysis after a failed attempt");
            }
            bail!(
                "{}\nRetake your photos starting with the {} scan.",
                err.user_message(),
                err.restart_slot()
            )
        }
    }
}

async fn previews(session: &AppSession) -> Result<()> {
    let Some(result) = session.analysis_result().await? else {
        bail!("No analysis found. Run `sgc-client analyze` first.");
    };
    let phone = session.phone().await?;
    let cache = session.previews();
    let cached = cache.load(phone.as_deref()).await;
    info!(cached, "Preview cache loaded");

    let mut requests = Vec::new();
    for context in result.outfit_catalog().contexts {
        for (index, outfit) in context.outfits.into_iter().enumerate() {
            requests.push(PreviewRequest::Outfit {
                context_name: context.context_name.clone(),
                outfit_index: index,
                outfit,
            });
        }
    }
    if let Some(barber) = result.barber_section() {
        for (index, item) in barber.hairstyles.into_iter().enumerate() {
            requests.push(PreviewRequest::Headshot {
                style: HeadshotStyle::Hairstyle,
                index,
                item,
            });
        }
    }
    if let Some(beard) = result.beard_section() {
        for (index, item) in beard.beard_styles.into_iter().enumerate() {
            requests.push(PreviewRequest::Headshot {
                style: HeadshotStyle::Beard,
                index,
                item,
            });
        }
    }

    for request in requests {
        let id = request.identifier();
        match cache.generate(request, phone.as_deref()).await {
            Ok(image) => println!("{}: {} bytes (base64)", id, image.len()),
            Err(e) => println!("{}: {}", id, e),
        }
    }
    Ok(())
}

async fn task(session: &AppSession, done: bool) -> Result<()> {
    let Some(phone) = session.phone().await? else {
        bail!("Not signed in. Run `sgc-client login` first.");
    };

    let Some(today) = session.tasks().today(&phone).await else {
        println!("No task available right now");
        return Ok(());
    };
    let Some(task) = today.task else {
        println!("{}", today.locked_message.or(today.message).unwrap_or_default());
        return Ok(());
    };

    println!("Day {} (week {}): {}", task.day, task.week, task.title);
    println!("{}", task.instruction);

    if done {
        session.tasks().start(&task);
        session.tasks().complete(&phone, &task).await?;
        println!("Marked as done");
    }
    Ok(())
}
