use airtype::classifier::{GestureClassifier, GestureProfile};
use airtype::config::Config;
use airtype::keyboard::{HomeRowCalibration, KeyboardMapper};
use airtype::landmarks::Handedness;
use airtype::pipeline::{RouterCommand, Tracker, frame_channel, run_tracker};
use airtype::profiles::{JsonProfileStore, ProfileStore};
use airtype::router::{AirTypeEvent, ModeRouter, TypingMode};
use airtype::session::{RecordedSession, ReplayDetector};
use airtype::state::RuntimeState;
use airtype::stats;
use airtype::typing::{TextBuffer, TextSink};
#[cfg(feature = "typing")]
use airtype::typing::{InputMethod, KeystrokeSink};

use anyhow::{Context, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "airtype", version, about = "Type in the air with your hands")]
struct Cli {
    /// Config file [default: airtype.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded landmark session through the tracker
    Replay {
        session: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<TypingMode>,
        /// Process every Nth frame
        #[arg(long)]
        frame_skip: Option<u32>,
        /// Calibrate the keyboard from the first frame showing both hands
        #[arg(long)]
        calibrate_first: bool,
        /// Saved calibration to start from
        #[arg(long)]
        calibration: Option<PathBuf>,
        /// Start with typing switched on instead of waiting for a palm hold
        #[arg(long)]
        active: bool,
        /// Also type into the focused application
        #[cfg(feature = "typing")]
        #[arg(long, value_enum)]
        keystrokes: Option<InputMethod>,
    },
    /// Calibrate the keyboard from a session and save the result
    Calibrate {
        session: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print key positions for a saved calibration
    Layout { calibration: PathBuf },
    /// Manage trained gesture profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesAction,
    },
    /// Print the nearest profile for every frame of a session
    Classify { session: PathBuf },
}

#[derive(Subcommand)]
enum ProfilesAction {
    /// List stored profiles
    List,
    /// Store the first hand of one session frame as the profile for a character
    Capture {
        character: String,
        session: PathBuf,
        /// Frame index within the session
        #[arg(long, default_value_t = 0)]
        frame: usize,
    },
    /// Delete the profile for a character
    Remove { character: String },
}

#[hotpath::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = Config::load(cli.config.as_deref())?;
    init_logging(&config.log_level, cli.verbose);
    if let Some(e) = config_error {
        warn!("{:#}, using defaults", e);
    }

    match cli.command {
        Command::Replay {
            session,
            mode,
            frame_skip,
            calibrate_first,
            calibration,
            active,
            #[cfg(feature = "typing")]
            keystrokes,
        } => {
            let mut config = config;
            if let Some(mode) = mode {
                config.router.mode = mode;
            }
            if let Some(n) = frame_skip {
                config.router.frame_skip = n;
            }
            if calibration.is_some() {
                config.keyboard.calibration_path = calibration;
            }

            #[cfg(feature = "typing")]
            let sink: Option<Box<dyn TextSink>> = match keystrokes {
                Some(method) => Some(Box::new(KeystrokeSink::new(method)?)),
                None => None,
            };
            #[cfg(not(feature = "typing"))]
            let sink: Option<Box<dyn TextSink>> = None;

            run_replay(&config, &session, calibrate_first, active, sink)
        }
        Command::Calibrate { session, out } => run_calibrate(&config, &session, &out),
        Command::Layout { calibration } => run_layout(&config, &calibration),
        Command::Profiles { action } => run_profiles(&config, action),
        Command::Classify { session } => run_classify(&config, &session),
    }
}

fn init_logging(level: &str, verbose: u8) {
    let filter = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_classifier(config: &Config) -> Arc<GestureClassifier> {
    let classifier = Arc::new(GestureClassifier::new(config.classifier.clone()));
    match JsonProfileStore::new(&config.profiles.path).load_profiles() {
        Ok(profiles) => classifier.update_profiles(profiles),
        Err(e) => warn!("{:#}, continuing without profiles", e),
    }
    classifier
}

// ============================================================================
// Replay
// ============================================================================

fn run_replay(
    config: &Config,
    session_path: &Path,
    calibrate_first: bool,
    active: bool,
    mut sink: Option<Box<dyn TextSink>>,
) -> anyhow::Result<()> {
    let session = RecordedSession::load(session_path)?;
    info!("Replaying {} frames", session.len());

    let classifier = load_classifier(config);
    let mapper = Arc::new(KeyboardMapper::new(config.keyboard.clone()));
    if let Some(path) = &config.keyboard.calibration_path {
        mapper.install(HomeRowCalibration::load(path)?)?;
    }
    if calibrate_first {
        let frame = session
            .first_with_both_hands()
            .context("No frame shows both hands to calibrate from")?;
        if let (Some(left), Some(right)) =
            (frame.hand(Handedness::Left), frame.hand(Handedness::Right))
        {
            if !mapper.calibrate(left, right) {
                warn!("Calibration from frame at {:.2}s failed", frame.t);
            }
        }
    }

    let router = ModeRouter::new(config, classifier, mapper);
    let state = RuntimeState::new(config);
    let shared_stats = stats::new_shared();
    let (event_tx, event_rx) = flume::unbounded();
    let (frame_tx, frame_rx) = frame_channel();
    let (command_tx, command_rx) = flume::unbounded();
    let tracker = Tracker::new(
        ReplayDetector,
        router,
        Arc::clone(&state),
        Arc::clone(&shared_stats),
        event_tx,
    );

    if active {
        let _ = command_tx.send(RouterCommand::SetTypingActive(true));
    }
    drop(command_tx);

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_ctrlc.store(false, Ordering::SeqCst);
    })?;

    let running_producer = Arc::clone(&running);
    let producer = thread::spawn(move || {
        for frame in session.into_frames() {
            if !running_producer.load(Ordering::SeqCst) || !frame_tx.send(frame) {
                break;
            }
        }
    });
    let worker = thread::spawn(move || {
        // The event sender goes away with the tracker, ending the loop below
        drop(run_tracker(tracker, frame_rx, command_rx, running));
    });

    let mut text = TextBuffer::new();
    for event in event_rx.iter() {
        match event {
            AirTypeEvent::CharacterTyped(character) => {
                println!("typed {:?}", character);
                text.apply(&character)?;
                if let Some(sink) = sink.as_mut() {
                    sink.apply(&character)?;
                }
            }
            AirTypeEvent::ActivationToggled { active } => {
                println!("typing {}", if active { "on" } else { "off" });
            }
        }
    }

    producer
        .join()
        .map_err(|_| anyhow!("Frame producer panicked"))?;
    worker.join().map_err(|_| anyhow!("Tracker panicked"))?;

    println!("\nText: {:?}", text.as_str());
    println!("Status: {}", state.status_line());
    let summary = shared_stats
        .lock()
        .map_err(|_| anyhow!("Stats lock poisoned"))?
        .summary();
    print!("{}", summary);
    Ok(())
}

// ============================================================================
// Keyboard
// ============================================================================

fn run_calibrate(config: &Config, session_path: &Path, out: &Path) -> anyhow::Result<()> {
    let session = RecordedSession::load(session_path)?;
    let Some(frame) = session.first_with_both_hands() else {
        bail!("{} has no frame with both hands", session_path.display());
    };
    let (Some(left), Some(right)) = (frame.hand(Handedness::Left), frame.hand(Handedness::Right))
    else {
        bail!("{} has no frame with both hands", session_path.display());
    };

    let calibration = HomeRowCalibration::from_hands(left, right, config.keyboard.min_confidence)
        .context("Calibration needs all eight fingertips visible with the index fingers apart")?;
    calibration.save(out)?;
    println!(
        "Calibrated from frame at {:.2}s: key width {:.4}, row height {:.4}",
        frame.t, calibration.key_width, calibration.row_height
    );
    println!("Saved to: {}", out.display());
    Ok(())
}

fn run_layout(config: &Config, calibration_path: &Path) -> anyhow::Result<()> {
    let mapper = KeyboardMapper::new(config.keyboard.clone());
    mapper.install(HomeRowCalibration::load(calibration_path)?)?;

    for key in mapper.key_positions() {
        let label = if key.character == " " {
            "space"
        } else {
            key.character
        };
        println!(
            "{:<6} {:<5} ({:.3}, {:.3})",
            label,
            key.hand.as_str(),
            key.position.x,
            key.position.y
        );
    }
    Ok(())
}

// ============================================================================
// Profiles
// ============================================================================

fn run_profiles(config: &Config, action: ProfilesAction) -> anyhow::Result<()> {
    let store = JsonProfileStore::new(&config.profiles.path);
    match action {
        ProfilesAction::List => {
            let profiles = store.load_profiles()?;
            if profiles.is_empty() {
                println!("No profiles in {}", store.path().display());
            }
            for p in profiles {
                println!(
                    "{:<4} {:>2} joints  {}",
                    p.character,
                    p.landmarks.len(),
                    p.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ProfilesAction::Capture {
            character,
            session,
            frame,
        } => {
            let session = RecordedSession::load(&session)?;
            let hand = session
                .frames
                .get(frame)
                .and_then(|f| f.hands.first())
                .with_context(|| format!("Frame {} has no hand", frame))?;
            let profile =
                GestureProfile::capture(&character, hand, config.classifier.min_confidence)
                    .context("No joint in that frame is confident enough")?;
            let joints = profile.landmarks.len();
            let profiles = store.upsert(profile)?;
            println!(
                "Stored {:?} ({} joints), {} profiles total",
                character,
                joints,
                profiles.len()
            );
        }
        ProfilesAction::Remove { character } => {
            if store.remove(&character)? {
                println!("Removed {:?}", character);
            } else {
                println!("No profile for {:?}", character);
            }
        }
    }
    Ok(())
}

fn run_classify(config: &Config, session_path: &Path) -> anyhow::Result<()> {
    let session = RecordedSession::load(session_path)?;
    let classifier = load_classifier(config);
    if classifier.profile_count() == 0 {
        bail!("No profiles in {}", config.profiles.path.display());
    }

    for frame in &session.frames {
        let Some(hand) = frame.hands.first() else {
            continue;
        };
        match classifier.nearest(hand) {
            Some(m) if m.distance < config.classifier.match_threshold => {
                println!("{:>8.2}s  {:<4} {:.4}", frame.t, m.character, m.distance)
            }
            Some(m) => println!(
                "{:>8.2}s  -    {:.4} (nearest {:?})",
                frame.t, m.distance, m.character
            ),
            None => println!("{:>8.2}s  -    no shared joints", frame.t),
        }
    }
    Ok(())
}
