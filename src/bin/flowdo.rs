//! CLI binary for flowdo.

use clap::{Parser, Subcommand};
use flowdo::auth::{AuthEvent, AuthGuard, CredentialStore, HttpTokenRefresher};
use flowdo::pomodoro::{TimerEvent, format_time};
use flowdo::{FlowdoConfig, TimerHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// FlowDo Pomodoro timer and session refresh guard.
#[derive(Parser)]
#[command(name = "flowdo", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run Pomodoro sessions in the terminal.
    Timer {
        /// Work session length in minutes.
        #[arg(long)]
        work: Option<u32>,
        /// Short break length in minutes.
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break length in minutes.
        #[arg(long)]
        long_break: Option<u32>,
        /// Work sessions per long break.
        #[arg(long)]
        sessions: Option<u32>,
        /// Number of sessions to run before exiting.
        #[arg(long, default_value_t = 1)]
        cycles: u32,
    },

    /// Renew the access credential once and print the updated cookies.
    Refresh {
        /// Session cookies as a `Cookie` header value.
        #[arg(long)]
        cookies: String,
    },

    /// Keep a session alive until it ends or Ctrl+C.
    ///
    /// Type `visible` or `unauthorized` on stdin to deliver those signals.
    Guard {
        /// Session cookies as a `Cookie` header value.
        #[arg(long)]
        cookies: String,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowdo=info,reqwest=warn,hyper=warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => FlowdoConfig::from_file(path)?,
        None => FlowdoConfig::load_or_default(&FlowdoConfig::default_config_path())?,
    };

    match cli.command {
        Command::Timer {
            work,
            short_break,
            long_break,
            sessions,
            cycles,
        } => {
            let p = &mut config.pomodoro;
            p.work_duration = work.unwrap_or(p.work_duration);
            p.short_break_duration = short_break.unwrap_or(p.short_break_duration);
            p.long_break_duration = long_break.unwrap_or(p.long_break_duration);
            p.sessions_until_long_break = sessions.unwrap_or(p.sessions_until_long_break);
            config.validate_pomodoro()?;
            run_timer(&config, cycles).await
        }
        Command::Refresh { cookies } => {
            config.validate_auth()?;
            run_refresh(&config, &cookies).await
        }
        Command::Guard { cookies } => {
            config.validate_auth()?;
            run_guard(&config, &cookies).await
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn run_timer(config: &FlowdoConfig, cycles: u32) -> anyhow::Result<()> {
    let (timer, mut events) = TimerHandle::spawn(config.pomodoro.settings(), config.pomodoro.timing());
    let mut snapshots = timer.subscribe();
    let mut remaining = cycles.max(1);

    timer.start().await?;
    println!("Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, stopping timer");
                timer.stop().await?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = *snapshots.borrow_and_update();
                eprint!("\r{:<12} {}  ", snap.session_type.label(), snap.formatted_time());
            }
            event = events.recv() => match event {
                Some(TimerEvent::SessionCompleted { finished, next, completed_work_sessions }) => {
                    println!(
                        "\n{} complete ({completed_work_sessions} work sessions). Next: {}",
                        finished.label(),
                        next.label()
                    );
                    remaining = remaining.saturating_sub(1);
                }
                Some(TimerEvent::Ready { session_type, time_left_secs }) => {
                    if remaining == 0 {
                        break;
                    }
                    println!("Starting {} ({})", session_type.label(), format_time(time_left_secs));
                    timer.start().await?;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    Ok(())
}

async fn run_refresh(config: &FlowdoConfig, cookies: &str) -> anyhow::Result<()> {
    let refresher = HttpTokenRefresher::new(config.auth.refresh_config())?;
    let credentials = CredentialStore::from_cookie_header(cookies);
    let (guard, _events) = AuthGuard::new(
        Arc::new(refresher),
        credentials.clone(),
        config.auth.guard_settings(),
    );

    let outcome = guard.renew().await?;
    if let Some(expires_in) = outcome.expires_in {
        println!("renewed, expires in {expires_in}s");
    } else {
        println!("renewed");
    }
    if let Some(header) = credentials.cookie_header() {
        println!("{header}");
    }
    Ok(())
}

async fn run_guard(config: &FlowdoConfig, cookies: &str) -> anyhow::Result<()> {
    let refresher = HttpTokenRefresher::new(config.auth.refresh_config())?;
    let (guard, mut events) = AuthGuard::new(
        Arc::new(refresher),
        CredentialStore::from_cookie_header(cookies),
        config.auth.guard_settings(),
    );
    if !guard.is_authenticated() {
        anyhow::bail!("no session cookies supplied");
    }

    let cancel = CancellationToken::new();
    let mut handle = guard.spawn(cancel.clone());
    let signaller = handle.signaller();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "visible" => {
                    signaller.visibility_regained();
                }
                "unauthorized" => {
                    signaller.unauthorized();
                }
                "" => {}
                other => eprintln!("unknown signal: {other}"),
            }
        }
    });

    println!("Guarding session. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(AuthEvent::Renewed { expires_in }) => {
                    println!("session renewed (expires_in: {expires_in:?})");
                }
                Some(AuthEvent::LoggedOut { reason, redirect, .. }) => {
                    println!("logged out: {reason}; redirect to {redirect}");
                    break;
                }
                None => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
