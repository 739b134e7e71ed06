mod config;
mod console;

use crate::config::{Config, PROCTOR_CAPACITY};
use crate::console::HELP;
use anyhow::{Context, Result};
use clap::Parser;
use interview_capture::{CameraProvider, ChannelRecognizer, FileCameraProvider, NoCamera};
use interview_core::timer::{elapsed_percent, format_clock};
use interview_core::{
    Command, HttpBackend, InterviewBackend, InterviewSession, ResumeUpload, SessionContext,
    SessionInput, SessionOutcome, TerminationReason, validate_setup,
};
use interview_types::Role;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::BufReader;
use tokio::sync::mpsc::{self, WeakSender};
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Run a proctored mock interview from the terminal")]
struct Cli {
    /// Interview length in minutes (5, 10, 15, 20, 30, 45 or 60)
    #[arg(long, default_value_t = 15)]
    duration: u32,
    /// technical, hr or mixed
    #[arg(long = "type", default_value = "mixed")]
    interview_type: String,
    /// Comma-separated skills to focus on
    #[arg(long, value_delimiter = ',', required = true)]
    skills: Vec<String>,
    /// The candidate's resume (PDF)
    #[arg(long)]
    resume: PathBuf,
    /// A JPEG served as the camera feed; without it there is no camera
    #[arg(long)]
    camera_frame: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse and check the candidate's choices ---
    let args = Cli::parse();
    let setup = validate_setup(args.duration, &args.interview_type, &args.skills)?;
    let resume = ResumeUpload::from_path(&args.resume)
        .await
        .with_context(|| format!("Failed to read resume {}", args.resume.display()))?;

    // --- 4. Create and start the interview ---
    let backend: Arc<dyn InterviewBackend> = Arc::new(
        HttpBackend::new(&config.api_base_url, config.auth_token(), config.request_timeout)
            .context("Failed to build the backend client")?,
    );
    let created = backend
        .setup(setup)
        .await
        .context("Failed to set up the interview")?;
    let interview_id = created.interview_id().clone();
    tracing::info!("interview {} created", interview_id);

    let opening = backend
        .start(interview_id.clone(), resume)
        .await
        .context("Failed to start the interview")?;

    // --- 5. Wire up the session ---
    let (command_tx, command_rx) = mpsc::channel::<Command>(64);
    let (input_tx, input_rx) = mpsc::channel::<SessionInput>(32);
    let (speech_tx, recognizer) = ChannelRecognizer::new(4);
    let camera: Arc<dyn CameraProvider> = match &args.camera_frame {
        Some(path) => Arc::new(FileCameraProvider::new(path.clone())),
        None => Arc::new(NoCamera),
    };

    let context = SessionContext::new(interview_id.clone(), args.duration)
        .with_settings(config.session_settings());
    let mut session = InterviewSession::new(context, backend.clone(), &opening, command_tx)
        .with_camera(camera)
        .with_recognizer(Arc::new(recognizer));

    let proctor_config = proctor_client::Config::builder()
        .with_base_url(&config.proctor_ws_url)
        .with_interview_id(&interview_id)
        .with_token(config.auth_token())
        .build();
    match proctor_client::connect_with_config(PROCTOR_CAPACITY, proctor_config).await {
        Ok(client) => session = session.with_proctor_link(client),
        Err(e) => tracing::warn!("proctoring unavailable, continuing without it: {}", e),
    }

    // --- 6. Spawn the runtime tasks ---
    // The console holds the only strong input sender: stdin EOF closes the
    // session's inputs, which ends the interview.
    let end_handle = input_tx.downgrade();
    let listening = Arc::new(AtomicBool::new(false));
    let presenter = tokio::spawn(present(command_rx, listening.clone()));
    let console = tokio::spawn(console::read_console(
        BufReader::new(tokio::io::stdin()),
        input_tx,
        speech_tx,
        listening,
    ));

    println!("{HELP}\n");

    // --- 7. Run until the interview ends or the user interrupts ---
    let session_task = tokio::spawn(session.run(input_rx));
    let outcome = supervise(session_task, end_handle, tokio::signal::ctrl_c()).await?;
    console.abort();
    if let Err(e) = presenter.await {
        tracing::warn!("presenter task failed: {}", e);
    }

    finish(backend.as_ref(), &outcome).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Tells the backend a manually ended interview is over; the other endings
/// are closed out by the backend itself.
async fn finish(backend: &dyn InterviewBackend, outcome: &SessionOutcome) {
    if outcome.termination_reason != Some(TerminationReason::Manual) {
        return;
    }
    match backend.end(outcome.interview_id.clone()).await {
        Ok(response) => tracing::info!("interview closed: {}", response.message()),
        Err(e) => tracing::warn!("failed to close the interview: {}", e),
    }
}

/// Waits for the session to end. A shutdown signal asks it to end as if the
/// candidate quit; a failure to listen for one is logged and ignored.
async fn supervise(
    mut session: JoinHandle<SessionOutcome>,
    end: WeakSender<SessionInput>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<SessionOutcome> {
    tokio::pin!(shutdown);
    let mut watching = true;
    loop {
        tokio::select! {
            outcome = &mut session => {
                return outcome.context("Interview session task failed");
            }
            signal = &mut shutdown, if watching => {
                watching = false;
                match signal {
                    Ok(()) => {
                        tracing::info!("Ctrl-C received, ending the interview.");
                        request_end(&end).await;
                    }
                    Err(e) => tracing::warn!("unable to listen for Ctrl-C: {}", e),
                }
            }
        }
    }
}

async fn request_end(end: &WeakSender<SessionInput>) {
    let Some(inputs) = end.upgrade() else {
        tracing::debug!("session inputs already closed");
        return;
    };
    if let Err(e) = inputs.send(SessionInput::End).await {
        tracing::warn!("failed to ask the session to end: {}", e);
    }
}

async fn present(mut commands: mpsc::Receiver<Command>, listening: Arc<AtomicBool>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::AskQuestion {
                text,
                round,
                audio_url,
            } => {
                println!("\n[Round {round}] {text}");
                if let Some(url) = audio_url {
                    tracing::debug!("question audio: {}", url);
                }
            }
            Command::Closing { text, .. } => println!("\n{text}"),
            Command::Tick { elapsed, remaining } => {
                if remaining % 60 == 0 && remaining > 0 {
                    let spent = elapsed_percent(elapsed, elapsed + remaining);
                    println!("[{} left, {spent:.0}% done]", format_clock(remaining));
                }
            }
            Command::LowTime { remaining } => {
                println!("Hurry up! {} remaining.", format_clock(remaining))
            }
            Command::AlertChanged(alert) => println!("[camera] {}", alert.label()),
            Command::Warning { message, .. } => println!("!! {message}"),
            Command::Transcript(window) => {
                if let Some(entry) = window.last().filter(|e| e.role() == Role::User) {
                    println!("You: {}", entry.text());
                }
            }
            Command::Listening => {
                listening.store(true, Ordering::SeqCst);
                println!("Listening... type what you say and press Enter.");
            }
            Command::CameraActive => println!("Camera is on."),
            Command::ProctoringLost => println!("Proctoring connection lost."),
            Command::CaptureUnavailable(reason) => {
                listening.store(false, Ordering::SeqCst);
                println!("{reason}");
            }
            Command::RecoverableError(reason) => {
                println!("Something went wrong: {reason}. Please try again.")
            }
            Command::SessionEnded(outcome) => {
                listening.store(false, Ordering::SeqCst);
                println!(
                    "\nInterview over after {} ({:?}).",
                    format_clock(outcome.elapsed_seconds),
                    outcome.phase
                );
            }
        }
    }
}
