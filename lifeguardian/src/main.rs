// Life Guardian - personal safety companion
// Command line entry point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lifeguardian::app::{AppState, BackendKind};
use lifeguardian::config::{BackendConfig, MOOD_WINDOW_DAYS};
use lifeguardian::database::{
    AssetDetails, MoodKind, NewContact, NewWillItem, ProfilePatch, SettingsPatch, WillContent,
};
use lifeguardian::stats;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Daily check-ins, moods, emergency contacts and a digital will
#[derive(Parser)]
#[command(name = "lifeguardian", version)]
#[command(about = "Life Guardian: check in daily and keep your people informed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (phone number locally, email when hosted) and sign in
    Register(Credentials),

    /// Sign in
    Login(Credentials),

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Record that you are okay right now
    CheckIn,

    /// Record today's mood (calm, happy, tired, sad, anxious)
    Mood {
        kind: MoodKind,
    },

    /// Life statistics, streak and the weekly mood chart
    Stats,

    /// Show or edit your profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage emergency contacts
    #[command(subcommand)]
    Contacts(ContactsCommand),

    /// Manage will items
    #[command(subcommand)]
    Will(WillCommand),

    /// Show or change notification settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args)]
struct Credentials {
    /// Phone number (local backend) or email address (hosted backend)
    identifier: String,

    #[arg(long)]
    password: String,
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,

        /// YYYY-MM-DD
        #[arg(long)]
        birthday: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        #[arg(long)]
        hobbies: Option<String>,
    },
    /// Upload a new avatar image
    Avatar {
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ContactsCommand {
    List,
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Parent, Spouse, Child, Sibling or Friend
        #[arg(long)]
        role: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum WillCommand {
    List,
    AddLetter {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,
    },
    AddAsset {
        #[arg(long)]
        title: String,

        #[arg(long)]
        institution: Option<String>,

        #[arg(long)]
        account_hint: Option<String>,

        #[arg(long)]
        value: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Hours without a check-in before contacts are alerted (24-168)
    SetPeriod {
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifeguardian=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = BackendConfig::from_env().context("invalid backend configuration")?;
    let state = AppState::initialize(&config)
        .await
        .context("failed to initialize application")?;

    let result = run(&state, cli.command).await;
    state.shutdown().await;

    result
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Register(creds) => {
            let user = state.session.sign_up(&creds.identifier, &creds.password).await?;
            println!("Welcome, {} ({})", user.display_name(), user.id);
        }
        Commands::Login(creds) => {
            let user = state.session.sign_in(&creds.identifier, &creds.password).await?;
            println!("Signed in as {}", user.display_name());
        }
        Commands::Logout => {
            state.session.sign_out().await?;
            println!("Signed out");
        }
        Commands::Whoami => match state.session.current_user() {
            Some(user) => {
                let backend = match state.backend {
                    BackendKind::Local => "local",
                    BackendKind::Hosted => "hosted",
                };
                println!("{} ({}, {} backend)", user.display_name(), user.id, backend);
                println!("Membership: {}", user.membership);
            }
            None => println!("Not signed in"),
        },
        Commands::CheckIn => {
            let user = state.session.require_user()?;
            let check_in = state.check_ins.check_in(&user.id).await?;
            let streak = state.check_ins.streak(&user.id).await?;
            println!("Checked in at {}", check_in.checked_at.to_rfc3339());
            println!("Streak: {} day(s)", streak);
        }
        Commands::Mood { kind } => {
            let user = state.session.require_user()?;
            state.moods.record(&user.id, kind).await?;
            println!("Mood recorded: {}", kind);
        }
        Commands::Stats => print_stats(state).await?,
        Commands::Profile(command) => profile(state, command).await?,
        Commands::Contacts(command) => contacts(state, command).await?,
        Commands::Will(command) => will(state, command).await?,
        Commands::Settings(command) => settings(state, command).await?,
    }

    Ok(())
}

async fn print_stats(state: &AppState) -> Result<()> {
    let user = state.session.require_user()?;

    let life = stats::life_stats(user.birthday.as_deref())?;
    let progress = stats::life_progress(life.days_alive);
    println!("Days alive:        {}", life.days_alive);
    println!("Remaining years:   {}", life.remaining_years);
    println!("Peer percentile:   {}%", life.peer_percentile);
    println!(
        "Life progress:     {:.1}% ({} days to go)",
        progress.percent_lived, progress.remaining_days
    );

    let streak = state.check_ins.streak(&user.id).await?;
    let checked_today = state.check_ins.today(&user.id).await?.is_some();
    let pending = if checked_today { "" } else { ", not yet today" };
    println!("Check-in streak:   {} day(s){}", streak, pending);

    let points = state.moods.stats(&user.id, MOOD_WINDOW_DAYS).await?;
    let chart: Vec<String> = points
        .iter()
        .map(|p| format!("{} {}", p.day, p.value))
        .collect();
    println!("Mood (7 days):     {}", chart.join(" | "));

    if let Some(mood) = state.moods.dominant(&user.id, MOOD_WINDOW_DAYS).await? {
        println!("Dominant mood:     {}", mood);
    }

    let summary = state.will.summary(&user.id).await?;
    println!(
        "Will items:        {} ({} ready, {} draft, {} unconfigured)",
        summary.total, summary.ready, summary.draft, summary.unconfigured
    );

    Ok(())
}

async fn profile(state: &AppState, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Show => {
            let user = state
                .session
                .refresh_profile()
                .await?
                .context("not signed in")?;
            println!("Name:     {}", user.display_name());
            println!("Birthday: {}", user.birthday.as_deref().unwrap_or("-"));
            println!("Bio:      {}", user.bio.as_deref().unwrap_or("-"));
            println!("Hobbies:  {}", user.hobbies.as_deref().unwrap_or("-"));
        }
        ProfileCommand::Set {
            name,
            birthday,
            bio,
            hobbies,
        } => {
            let patch = ProfilePatch {
                name,
                birthday,
                bio,
                hobbies,
                ..Default::default()
            };
            if patch.is_empty() {
                println!("Nothing to change");
                return Ok(());
            }
            let user = state.session.update_profile(patch).await?;
            println!("Profile updated for {}", user.display_name());
        }
        ProfileCommand::Avatar { path } => {
            let user = state.session.require_user()?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("avatar path has no file name")?
                .to_string();
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;

            let url = state.profiles.upload_avatar(&user.id, &file_name, data).await?;
            println!("Avatar saved: {}", url);
        }
    }

    Ok(())
}

async fn contacts(state: &AppState, command: ContactsCommand) -> Result<()> {
    let user = state.session.require_user()?;

    match command {
        ContactsCommand::List => {
            let contacts = state.contacts.list(&user.id).await?;
            if contacts.is_empty() {
                println!("No emergency contacts yet");
            }
            for contact in contacts {
                println!("{}  {} <{}> [{}]", contact.id, contact.name, contact.email, contact.role);
            }
        }
        ContactsCommand::Add { name, email, role } => {
            let contact = state
                .contacts
                .create(
                    &user.id,
                    NewContact {
                        name,
                        email,
                        role,
                        avatar_url: None,
                    },
                )
                .await?;
            println!("Added {} ({})", contact.name, contact.id);
        }
        ContactsCommand::Remove { id } => {
            if state.contacts.delete(&id).await? {
                println!("Removed {}", id);
            } else {
                println!("No contact with id {}", id);
            }
        }
    }

    Ok(())
}

async fn will(state: &AppState, command: WillCommand) -> Result<()> {
    let user = state.session.require_user()?;

    let item = match command {
        WillCommand::List => {
            for item in state.will.list(&user.id).await? {
                println!("{}  [{:?}/{:?}] {}", item.id, item.kind(), item.status, item.title);
                if let WillContent::Asset(details) = &item.content {
                    if let Some(institution) = &details.institution {
                        println!("      institution: {}", institution);
                    }
                    if let Some(value) = &details.estimated_value {
                        println!("      estimated value: {}", value);
                    }
                }
            }
            return Ok(());
        }
        WillCommand::AddLetter { title, body } => NewWillItem {
            title,
            content: WillContent::Letter { body },
            status: None,
            meta: None,
            meta_icon: None,
        },
        WillCommand::AddAsset {
            title,
            institution,
            account_hint,
            value,
            notes,
        } => NewWillItem {
            title,
            content: WillContent::Asset(AssetDetails {
                institution,
                account_hint,
                estimated_value: value,
                notes,
            }),
            status: None,
            meta: None,
            meta_icon: None,
        },
    };

    let created = state.will.create(&user.id, item).await?;
    println!("Created {} ({})", created.title, created.id);

    Ok(())
}

async fn settings(state: &AppState, command: SettingsCommand) -> Result<()> {
    let user = state.session.require_user()?;

    match command {
        SettingsCommand::Show => {
            let values = state.settings.get_or_default(&user.id).await?;
            let template = state.settings.email_config_or_default(&user.id).await?;
            println!("Detection period: {} hours", values.detection_period_hours);
            println!("Push enabled:     {}", values.push_enabled);
            println!("Do not disturb:   {}", values.do_not_disturb);
            println!("Sound:            {}", values.sound);
            println!("Vibration:        {}", values.vibration);
            println!("Alert subject:    {}", template.subject);
        }
        SettingsCommand::SetPeriod { hours } => {
            let patch = SettingsPatch {
                detection_period_hours: Some(hours),
                ..Default::default()
            };
            let updated = state.settings.update(&user.id, patch).await?;
            println!("Detection period set to {} hours", updated.detection_period_hours);
        }
    }

    Ok(())
}
