use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use greenhouse_monitor::{
    api::{
        models::{Credentials, PasswordChange, Registration},
        redirect::{LoginRedirect, Navigator, LOGIN_PATH},
    },
    auth::{AuthService, LogoutOutcome, ProfileSource, UpdateOutcome},
    config::{parse_interval, Config},
    models::{Actuator, IdealRange, ProfileChanges, UserProfile},
    monitor::{MonitorOptions, SensorMonitor},
    render::{self, Theme},
    session::{guard::RECHECK_AFTER, GuardView, SessionGuard, SessionStore},
    ApiClient,
};
use tokio::{signal, sync::Notify, time};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// greenhouse - terminal dashboard for the greenhouse monitoring backend
#[derive(Parser, Debug)]
#[command(name = "greenhouse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "GREENHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "GREENHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session
    Logout,
    /// Show or edit the logged-in profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// List rooms
    Rooms,
    /// Overview of every room
    Dashboard,
    /// Live view of one room until Ctrl-C
    Watch {
        #[arg(short, long)]
        room: Option<u32>,
        /// Polling interval in milliseconds
        #[arg(long = "interval-ms", value_name = "MS", value_parser = parse_interval_arg)]
        interval: Option<Duration>,
        /// Seed the chart from the backend's recent history
        #[arg(long)]
        history: bool,
    },
    /// Flip a room's fan or lamp
    Toggle {
        #[arg(short, long)]
        room: Option<u32>,
        /// fan or lamp
        actuator: Actuator,
    },
    /// Choose the colour theme
    Theme { mode: ThemeArg },
    /// Check that the backend answers
    Health,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    Photo {
        path: PathBuf,
    },
    DeletePhoto,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Dark,
    Light,
}

fn parse_interval_arg(s: &str) -> Result<Duration, String> {
    parse_interval(s).map_err(|e| e.to_string())
}

/// Prints login redirects and wakes anything waiting on [`redirected`](Self::redirected).
#[derive(Default)]
struct TerminalNavigator {
    redirected: Notify,
}

impl TerminalNavigator {
    async fn redirected(&self) {
        self.redirected.notified().await;
    }
}

impl Navigator for TerminalNavigator {
    fn redirect_to_login(&self, redirect: &LoginRedirect) {
        eprintln!(
            "Your session has expired. Run `greenhouse login` to continue ({}).",
            redirect.location()
        );
        self.redirected.notify_one();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they never mix with rendered output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("greenhouse_monitor=info")),
        )
        .init();

    let config = Config::from_env()?;
    let store = SessionStore::new(config.state_dir.clone());
    let navigator = Arc::new(TerminalNavigator::default());
    let client = ApiClient::from_config(&config, store.clone(), navigator.clone())?;

    if let Some(cookies) = store.load().await.and_then(|r| r.cookies) {
        client.restore_cookies(&cookies);
    }

    let auth = AuthService::new(client.clone());

    match cli.command {
        Command::Login { username, password } => {
            client.set_view(LOGIN_PATH);
            let user = auth.login(&Credentials { username, password }).await?;
            println!("Logged in as {}", display_name(&user));
        }
        Command::Register {
            username,
            name,
            email,
            password,
        } => {
            client.set_view("/register");
            let message = auth
                .register(&Registration {
                    username,
                    name,
                    email,
                    password,
                })
                .await?;
            println!("{message}");
        }
        Command::Logout => match auth.logout().await? {
            LogoutOutcome::Complete => println!("Logged out"),
            LogoutOutcome::ClientOnly => {
                println!("Logged out locally; the server could not be reached")
            }
        },
        Command::Profile { action } => {
            client.set_view("/profile");
            profile(&auth, action.unwrap_or(ProfileAction::Show)).await?;
        }
        Command::Rooms => {
            client.set_view("/rooms");
            print!("{}", render::rooms_table(&client.rooms().await?));
        }
        Command::Dashboard => {
            client.set_view("/dashboard");
            let theme = Theme::from_dark_mode(store.dark_mode().await);
            let rooms = client.dashboard().await?;
            print!(
                "{}",
                render::overview_table(&rooms, &IdealRange::default(), theme)
            );
        }
        Command::Watch {
            room,
            interval,
            history,
        } => {
            let options = MonitorOptions {
                interval: interval.unwrap_or(config.poll_interval),
                seed_history: history,
            };
            watch(
                client,
                navigator,
                room.unwrap_or(config.default_room_id),
                options,
            )
            .await?;
        }
        Command::Toggle { room, actuator } => {
            let room_id = room.unwrap_or(config.default_room_id);
            client.set_view(format!("/rooms/{room_id}"));
            let monitor = SensorMonitor::new(client, room_id, MonitorOptions::default());
            let state = monitor.toggle(actuator).await?;
            println!(
                "Room {room_id}: {actuator} {}",
                if state.get(actuator) { "ON" } else { "OFF" }
            );
        }
        Command::Theme { mode } => {
            store.set_dark_mode(matches!(mode, ThemeArg::Dark)).await?;
            println!("Theme set to {mode:?}");
        }
        Command::Health => {
            let report = client.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.healthy {
                bail!("backend at {} is not healthy", report.url);
            }
        }
    }

    Ok(())
}

fn display_name(user: &UserProfile) -> &str {
    if user.name.is_empty() {
        &user.username
    } else {
        &user.name
    }
}

async fn profile(auth: &AuthService, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Show => {
            let (user, source) = auth.profile().await?;
            println!("{} (@{})", display_name(&user), user.username);
            println!("  id:    {}", user.id);
            println!("  email: {}", user.email);
            if let Some(url) = auth.photo_url(&user) {
                println!("  photo: {url}");
            }
            if source == ProfileSource::Local {
                println!("  (offline copy; the server could not be reached)");
            }
        }
        ProfileAction::Update {
            username,
            name,
            email,
        } => {
            let changes = ProfileChanges {
                username,
                name,
                email,
            };
            let (user, outcome) = auth.update_profile(&changes).await?;
            report_update(&format!("Profile of {}", display_name(&user)), outcome);
        }
        ProfileAction::Password { current, new } => {
            auth.update_password(&PasswordChange {
                current_password: current,
                new_password: new,
            })
            .await?;
            println!("Password changed");
        }
        ProfileAction::Photo { path } => {
            let (_, outcome) = auth.upload_photo(&path).await?;
            report_update("Profile photo", outcome);
        }
        ProfileAction::DeletePhoto => {
            auth.delete_photo().await?;
            println!("Profile photo removed");
        }
    }
    Ok(())
}

fn report_update(what: &str, outcome: UpdateOutcome) {
    match outcome {
        UpdateOutcome::Synced => println!("{what} updated"),
        UpdateOutcome::LocalOnly => {
            println!("{what} saved locally; it will not be on the server until you retry")
        }
    }
}

async fn watch(
    client: ApiClient,
    navigator: Arc<TerminalNavigator>,
    room_id: u32,
    options: MonitorOptions,
) -> Result<()> {
    let path = format!("/rooms/{room_id}");
    let guard = SessionGuard::new(client.clone());
    if let GuardView::RedirectToLogin(redirect) = guard.visit(&path).await {
        client.redirect_to_login(&redirect);
        bail!("not logged in");
    }

    let theme = Theme::from_dark_mode(client.store().dark_mode().await);
    let monitor = SensorMonitor::new(client.clone(), room_id, options);
    let mut state = monitor.subscribe();
    let handle = monitor.mount();

    let mut recheck = time::interval_at(time::Instant::now() + RECHECK_AFTER, RECHECK_AFTER);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = navigator.redirected() => {
                warn!(room_id, "Session ended while watching");
                break;
            }
            _ = recheck.tick() => {
                if let GuardView::RedirectToLogin(redirect) = guard.visit(&path).await {
                    client.redirect_to_login(&redirect);
                    break;
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                print!("\x1b[2J\x1b[H{}", render::dashboard(&snapshot, theme));
            }
        }
    }

    guard.unmount();
    handle.unmount();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
