//! pomod - the pomosync timer client
//!
//! This is the main entry point for the pomod client.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Timer engine
//! - HTTP session gateway
//! - Desktop notifications and sound
//! - Stdin commands

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{UserCommand, HELP};
use pomo_api::{NotificationContext, TimerSnapshot, TimerView};
use pomo_config::{load_config_or_default, Settings};
use pomo_core::{
    deliver, CoreEvent, GatewayRequest, Outcome, SessionBinding, TimerEngine,
};
use pomo_host_api::{
    GatewayResult, HostCapabilities, NotificationTransport, SessionGateway, SoundPlayer,
    VisibilityMonitor,
};
use pomo_host_native::{DesktopNotifier, DesktopSound, HttpGateway, HttpGatewayConfig, ManualVisibility};
use pomo_store::{KeyValueStore, MemoryStore, SqliteStore};
use pomo_util::{default_config_path, default_data_dir, default_store_path, format_countdown, ActivityId, SessionId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Poll period of the main loop; engine intervals are resolved against it
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// pomod - Pomodoro timer synchronized with a remote session service
#[derive(Parser, Debug)]
#[command(name = "pomod")]
#[command(about = "Pomodoro timer synchronized with a remote session service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/pomosync/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Activity the session belongs to
    #[arg(short, long, env = "POMO_ACTIVITY")]
    activity: String,

    /// Session to drive
    #[arg(short, long, env = "POMO_SESSION")]
    session: String,

    /// Activity title used in notifications
    #[arg(short, long)]
    title: Option<String>,

    /// Data directory override (or set POMO_DATA_DIR env var)
    #[arg(short, long, env = "POMO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

type GatewayReply = (GatewayRequest, GatewayResult<TimerSnapshot>);

/// Main client state
struct Client {
    engine: TimerEngine,
    gateway: Arc<dyn SessionGateway>,
    notifier: Arc<dyn NotificationTransport>,
    sound: Arc<dyn SoundPlayer>,
    visibility: Arc<ManualVisibility>,
    view_tx: watch::Sender<TimerView>,
    reply_tx: mpsc::UnboundedSender<GatewayReply>,
    reply_rx: mpsc::UnboundedReceiver<GatewayReply>,
    modal_tx: mpsc::UnboundedSender<NotificationContext>,
    modal_rx: mpsc::UnboundedReceiver<NotificationContext>,
}

impl Client {
    fn new(args: &Args) -> Result<Self> {
        let settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            base_url = %settings.server.base_url,
            device = ?settings.device,
            "Configuration loaded"
        );

        let store = open_store(args, &settings);

        let gateway = HttpGateway::new(HttpGatewayConfig {
            base_url: settings.server.base_url.clone(),
            token: settings.server.token.clone(),
            timeout: settings.server.timeout,
        })
        .context("Failed to create session gateway")?;

        let notifier = DesktopNotifier::new("pomod");
        let sound = DesktopSound::new();
        info!(
            notifier = ?notifier.backend(),
            sound = sound.backend().name(),
            "Host services initialized"
        );

        let visibility = Arc::new(ManualVisibility::new(true));
        let capabilities = HostCapabilities::full(settings.device);

        let binding = SessionBinding {
            activity_id: ActivityId::new(args.activity.clone()),
            session_id: SessionId::new(args.session.clone()),
            activity_title: args.title.clone(),
        };
        let engine = TimerEngine::new(
            binding,
            &settings,
            capabilities,
            store,
            visibility.is_visible(),
        );

        let (view_tx, _) = watch::channel(TimerView::default());
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (modal_tx, modal_rx) = mpsc::unbounded_channel();

        Ok(Self {
            engine,
            gateway: Arc::new(gateway),
            notifier: Arc::new(notifier),
            sound: Arc::new(sound),
            visibility,
            view_tx,
            reply_tx,
            reply_rx,
            modal_tx,
            modal_rx,
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        let mut visibility = self.visibility.subscribe();
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut poll_timer = tokio::time::interval(POLL_INTERVAL);
        poll_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = self.engine.initialize(pomo_util::now());
        self.apply(outcome);

        info!("Client running");
        println!("{}", HELP);

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                _ = poll_timer.tick() => {
                    let outcome = self.engine.poll(pomo_util::now());
                    self.apply(outcome);
                }

                Some((request, result)) = self.reply_rx.recv() => {
                    let outcome = self.engine.handle_response(&request, result, pomo_util::now());
                    self.apply(outcome);
                }

                Some(context) = self.modal_rx.recv() => {
                    print_modal(&context);
                }

                Ok(()) = visibility.changed() => {
                    let visible = *visibility.borrow_and_update();
                    let outcome = self.engine.set_visible(visible, pomo_util::now());
                    self.apply(outcome);
                }

                line = stdin.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_line(&line) {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("Stdin closed, commands disabled");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read stdin");
                            stdin_open = false;
                        }
                    }
                }
            }
        }

        info!("Shutting down pomod");
        Ok(())
    }

    /// Returns false when the user asked to quit
    fn handle_line(&mut self, line: &str) -> bool {
        let cmd = match UserCommand::parse(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return true,
            Err(e) => {
                println!("{}", e);
                return true;
            }
        };

        let now = pomo_util::now();
        let result = match cmd {
            UserCommand::Start | UserCommand::Resume => self.engine.start(now),
            UserCommand::Pause => self.engine.pause(now),
            UserCommand::Skip => self.engine.skip(now),
            UserCommand::Reset => Ok(self.engine.reset(now)),
            UserCommand::Finish => self.engine.finish(now),
            UserCommand::Stop => self.engine.stop(now),
            UserCommand::SetRemaining(secs) => self.engine.set_remaining_seconds(secs, now),
            UserCommand::CancelAutoStart => Ok(self.engine.cancel_auto_start()),
            UserCommand::Status => {
                print_view(&self.view_tx.borrow());
                return true;
            }
            UserCommand::Logout => {
                self.engine.logout();
                return true;
            }
            UserCommand::Hide => {
                self.visibility.set_visible(false);
                return true;
            }
            UserCommand::Show => {
                self.visibility.set_visible(true);
                return true;
            }
            UserCommand::Help => {
                println!("{}", HELP);
                return true;
            }
            UserCommand::Quit => return false,
        };

        match result {
            Ok(outcome) => {
                self.apply(outcome);
                print_view(&self.engine.view(now));
            }
            Err(e) => println!("{}", e),
        }
        true
    }

    /// Execute requests, surface events, publish the view
    fn apply(&mut self, outcome: Outcome) {
        for request in outcome.requests {
            self.spawn_request(request);
        }
        for event in outcome.events {
            self.handle_core_event(event);
        }
        self.view_tx.send_replace(self.engine.view(pomo_util::now()));
    }

    fn spawn_request(&self, request: GatewayRequest) {
        let gateway = self.gateway.clone();
        let reply_tx = self.reply_tx.clone();
        let binding = self.engine.binding().clone();

        tokio::spawn(async move {
            let result = gateway
                .execute(request.call, &binding.activity_id, &binding.session_id)
                .await;
            if reply_tx.send((request, result)).is_err() {
                debug!("Client gone, dropping gateway reply");
            }
        });
    }

    fn handle_core_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::Notify(dispatch) => {
                let notifier = self.notifier.clone();
                let sound = self.sound.clone();
                let modal_tx = self.modal_tx.clone();
                tokio::spawn(async move {
                    let report = deliver(&dispatch, notifier.as_ref(), sound.as_ref()).await;
                    if report.show_modal {
                        let _ = modal_tx.send(dispatch.context);
                    }
                });
            }
            CoreEvent::ShowModal(context) => print_modal(&context),
            CoreEvent::ConnectionChanged { connected } => {
                if connected {
                    println!("Reconnected to the session service");
                } else {
                    println!("Disconnected: the timer keeps running locally");
                }
            }
            CoreEvent::AuthExpired => {
                println!("Your login has expired; the timer keeps running locally");
            }
            CoreEvent::RetryLater { action, error } => {
                println!("Could not {} on the server ({}), please retry later", action, error);
            }
            CoreEvent::AutoStartScheduled { phase, in_secs } => {
                println!("{} starts in {}s (type 'cancel' to stop it)", phase.label(), in_secs);
            }
            CoreEvent::SessionEnded { status } => {
                println!("Session ended: {}", status);
            }
            CoreEvent::PersistenceUnavailable => {
                println!("Local storage unavailable; progress is kept in memory only");
            }
            other => debug!(event = ?other, "Core event"),
        }
    }
}

fn open_store(args: &Args, settings: &Settings) -> Arc<dyn KeyValueStore> {
    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    let path = settings
        .store_path
        .clone()
        .unwrap_or_else(|| default_store_path(&data_dir));

    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "Failed to create data directory");
    }

    match SqliteStore::open(&path) {
        Ok(store) => {
            info!(db_path = %path.display(), "Store initialized");
            Arc::new(store)
        }
        Err(e) => {
            warn!(db_path = %path.display(), error = %e, "Failed to open store, continuing memory-only");
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_view(view: &TimerView) {
    let mut line = format!(
        "[{}] {} {} (cycles: {})",
        view.status,
        view.phase.label(),
        format_countdown(view.remaining_seconds),
        view.cycles_completed
    );
    if view.has_custom_time {
        line.push_str(" custom");
    }
    if let Some(secs) = view.auto_start_in_seconds {
        line.push_str(&format!(" auto-start in {}s", secs));
    }
    if !view.connected {
        line.push_str(" disconnected");
    }
    println!("{}", line);
}

fn print_modal(context: &NotificationContext) {
    println!();
    println!("=== {} ===", context.title);
    println!("{}", context.body);
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        activity = %args.activity,
        session = %args.session,
        "pomod starting"
    );

    if pomo_util::is_mock_time_active() {
        warn!(now = %pomo_util::now(), "Mock time is active, timestamps are not real");
    }

    let client = Client::new(&args)?;
    if let Err(e) = client.run().await {
        error!(error = %e, "Client exited with error");
        return Err(e);
    }
    Ok(())
}
