use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};

use crate::core::{
    desk::{spawn_desk, DeskActor},
    mode::{CheckInMode, ModeSwitch},
    participant::Identifier,
    settings::Settings,
    workflow::CheckInWorkflow,
};
use crate::integrations::register_api::RegisterApi;

mod core;
mod error;
mod integrations;
mod web;

#[derive(Parser, Debug)]
#[command(name = "checkin-desk")]
#[command(version = "0.1")]
#[command(about = "A check-in desk for event registrations.", long_about = None)]
struct Args {
    /// Location of the json settings file.
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Event to work on, overriding the settings file.
    #[arg(short, long)]
    event: Option<String>,

    #[command(subcommand)]
    command: RunType,
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Show a participant's check-in state without changing it.
    Lookup {
        /// Email or phone number.
        id: String,
    },

    /// Check a participant in.
    CheckIn {
        /// Email or phone number.
        id: String,

        /// Accept the participant even if their record carries a review comment.
        /// Unpaid participants are still refused.
        #[arg(long)]
        override_comment: bool,
    },

    /// Reverse a participant's check-in.
    Cancel {
        /// Participant email.
        id: String,
    },

    /// Print the registration counters for the event.
    Counters,

    /// Ask the registration API to recount the event counters.
    Reconcile,

    /// Run the desk API for a browser front-end.
    Serve {
        /// Port for the desk API, overriding the settings file.
        #[arg(short, long)]
        port: Option<u16>,

        /// Start in live mode, checking in every scanned participant.
        #[arg(short, long)]
        live: bool,
    },
}

/// Sending half of an actor's request channel
pub struct ActorRef<T> {
    tx: UnboundedSender<T>,
}

impl<T> Clone for ActorRef<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ActorRef<T> {
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a request. Requests sent after the actor stopped are dropped.
    pub fn send(&self, msg: T) {
        if self.tx.send(msg).is_err() {
            log::error!("Actor is no longer running, request dropped");
        }
    }
}

/// Return-to-origin handle used by actors to answer a request
pub struct Rto<T> {
    tx: oneshot::Sender<anyhow::Result<T>>,
}

impl<T> Rto<T> {
    pub fn channel() -> (Self, oneshot::Receiver<anyhow::Result<T>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn reply(self, value: anyhow::Result<T>) {
        // The requester may have given up waiting
        self.tx.send(value).ok();
    }
}

/// Sends a request to an actor and awaits its reply.
///
/// `send_message!(actor, RequestEnum, Variant, args...)` evaluates to `anyhow::Result<T>`.
#[macro_export]
macro_rules! send_message {
    ($actor:expr, $request:ident, $variant:ident $(, $arg:expr)* $(,)?) => {{
        let (rto, rx) = $crate::Rto::channel();
        $actor.send($request::$variant($($arg,)* rto));
        match rx.await {
            Ok(reply) => reply,
            Err(_) => Err(anyhow::anyhow!("Actor dropped the request")),
        }
    }};
}

/// Handles shared by the web endpoints
#[derive(Clone)]
pub struct Directory {
    pub desk_actor: DeskActor,
    /// The only writer of the live mode
    pub mode: Arc<ModeSwitch>,
    pub api: Arc<RegisterApi>,
    pub event: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let mut settings = Settings::load(&args.settings)?;
    if let Some(event) = args.event {
        settings.event = event;
    }
    settings.validate()?;

    let api = Arc::new(RegisterApi::new(&settings)?);
    let workflow = CheckInWorkflow::new(api.clone());
    let event = settings.event.clone();

    let parse_id = |raw: &str| Identifier::parse(raw).ok_or_else(|| anyhow!("Empty identifier"));

    match args.command {
        RunType::Lookup { id } => {
            let outcome = workflow.fetch_state(&parse_id(&id)?, &event).await;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        RunType::CheckIn {
            id,
            override_comment,
        } => {
            let outcome = workflow
                .perform_check_in(&parse_id(&id)?, &event, override_comment)
                .await;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        RunType::Cancel { id } => {
            let outcome = workflow.cancel_check_in(&parse_id(&id)?, &event).await;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        RunType::Counters => {
            print_json(&api.counters(&event).await?)?;
            Ok(true)
        }
        RunType::Reconcile => {
            let response = api.reconcile_counters(&event).await?;
            log::info!("{}", response.message);
            print_json(&response)?;
            Ok(true)
        }
        RunType::Serve { port, live } => {
            let (switch, watch) = CheckInMode::new(live || settings.live_mode);
            let (desk_actor, desk_task) = spawn_desk(api.clone(), event.clone(), watch);

            let directory = Directory {
                desk_actor,
                mode: Arc::new(switch),
                api,
                event: event.clone(),
            };

            log::info!("Desk ready for {}", event);
            tokio::select! {
                res = web::run_http_server(directory, port.unwrap_or(settings.web_port())) => res?,
                res = desk_task => res??,
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
