use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use vita_client::ApiClient;
use vita_core::controller::{CaptureSessionController, ControllerConfig, FlowSignals};
use vita_core::types::{DocRule, DocSessionRequest, DocSide, DocSideRecord, RuleKind, RuleResult};
use vita_transport::sim::{ScriptedOutcome, SimEnvironment, SimMedia, SimProbe, SimTransport};

#[derive(Parser)]
#[command(name = "vita", about = "Vita capture flow CLI")]
struct Cli {
    /// Backend base URL
    #[arg(short, long, global = true, default_value = "http://127.0.0.1:8099")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated liveness capture against the backend
    Demo {
        /// Identity to bind the session to
        #[arg(long)]
        identity: Option<String>,
        /// Run the secondary capture + match phase after success
        #[arg(long)]
        matching: bool,
        /// Script a failing challenge
        #[arg(long)]
        fail: bool,
        /// Brightness seed for the secondary still; a distant seed
        /// makes the match phase fail
        #[arg(long, default_value_t = 32)]
        still_seed: u8,
        /// Recording label passed to the transport
        #[arg(long, default_value = "vita-capture")]
        label: String,
    },
    /// Run a simulated document capture and print the shaped result
    Doc {
        /// ISO country code
        #[arg(long, default_value = "usa")]
        country: String,
        /// Document type, e.g. passport or driving-licence
        #[arg(long, default_value = "passport")]
        doc_type: String,
    },
    /// Show backend health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            identity,
            matching,
            fail,
            still_seed,
            label,
        } => run_demo(&cli.backend, identity, matching, fail, still_seed, label).await,
        Commands::Doc { country, doc_type } => run_doc(&cli.backend, country, doc_type).await,
        Commands::Status => run_status(&cli.backend).await,
    }
}

async fn run_demo(
    backend: &str,
    identity: Option<String>,
    matching: bool,
    fail: bool,
    still_seed: u8,
    label: String,
) -> Result<()> {
    let client = Arc::new(ApiClient::new(backend)?);

    let outcome = if fail {
        ScriptedOutcome::failure("face lost")
    } else {
        ScriptedOutcome::success()
    };
    let transport = Arc::new(SimTransport::new(client.clone()).with_outcome(Some(outcome)));

    let config = ControllerConfig {
        identity_id: identity,
        matching_enabled: matching,
        recording_label: label,
        ..ControllerConfig::default()
    };
    let (controller, signals) = CaptureSessionController::new(
        config,
        client.clone(),
        transport,
        Arc::new(SimMedia::new().with_still_seed(still_seed)),
        Arc::new(SimProbe::good()),
        Arc::new(SimEnvironment::supported()),
    );

    spawn_printers(signals);
    let report = controller.run().await;

    println!();
    println!("final screen : {:?}", report.final_screen);
    if let Some(session) = &report.session_id {
        println!("session      : {session}");
    }
    if let Some(verdict) = &report.verdict {
        println!("liveness ok  : {}", verdict.is_liveness_succeeded);
    }
    if let Some(message) = &report.message {
        println!("message      : {message}");
    }
    if let Some(m) = &report.match_verdict {
        println!("match        : {} (score {:.3})", m.matching, m.score);
    }
    if let Some(best) = &report.best_image {
        println!("best image   : {} bytes", best.len());
    }
    Ok(())
}

/// Mirror the flow's signals onto stdout as they change.
fn spawn_printers(mut signals: FlowSignals) {
    let mut screen = signals.screen.clone();
    tokio::spawn(async move {
        while screen.changed().await.is_ok() {
            let current = *screen.borrow();
            println!("screen   : {current:?}");
        }
    });

    let mut guidance = signals.guidance.clone();
    tokio::spawn(async move {
        while guidance.changed().await.is_ok() {
            let current = *guidance.borrow();
            println!("guidance : {current:?}");
        }
    });

    let mut remediation = signals.remediation.clone();
    tokio::spawn(async move {
        while remediation.changed().await.is_ok() {
            if let Some(weak) = *remediation.borrow() {
                println!("network  : weak connection ({weak:?} below floor)");
            }
        }
    });

    tokio::spawn(async move {
        while let Some(color) = signals.colors.recv().await {
            println!("color    : {color}");
        }
    });
}

async fn run_doc(backend: &str, country: String, doc_type: String) -> Result<()> {
    let client = ApiClient::new(backend)?;

    let handle = client
        .init_document_session(&DocSessionRequest {
            country,
            doc_type,
            rules: None,
        })
        .await?;
    println!("session : {}", handle.session_id);
    println!("format  : {}", handle.format);
    println!(
        "rules   : {}",
        handle
            .rules
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Stand in for the capture device: push one front side, then
    // report completion so the result unlocks.
    let record = DocSideRecord {
        side: DocSide::Front,
        timeout: false,
        diagnostic: None,
        doc_image: Some("ZGVtbw==".to_string()),
        doc_corners: Some(vec![[12.0, 8.0], [628.0, 10.0], [630.0, 392.0], [10.0, 396.0]]),
        rule_results: sample_results(&handle.rules),
    };
    client.push_doc_side_result(&handle.session_id, &record).await?;
    client
        .doc_capture_callback(&handle.session_id, "demo-capture")
        .await?;

    let shaped = client
        .doc_capture_result(&handle.session_id, &handle.doc_type, DocSide::Front, false)
        .await?;
    match shaped {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("result not ready"),
    }
    Ok(())
}

/// Plausible extraction output for each configured rule.
fn sample_results(rules: &[DocRule]) -> Vec<RuleResult> {
    rules
        .iter()
        .map(|rule| {
            let fields = match rule.kind {
                RuleKind::Mrz => BTreeMap::from([
                    ("documentNumber".to_string(), "X4028191".to_string()),
                    ("surname".to_string(), "DOE".to_string()),
                    ("givenNames".to_string(), "JANE".to_string()),
                ]),
                RuleKind::Ocr => BTreeMap::from([
                    ("dateOfBirth".to_string(), "1991-04-12".to_string()),
                    ("expiryDate".to_string(), "2031-04-11".to_string()),
                ]),
                RuleKind::Pdf417 => BTreeMap::from([(
                    "licence".to_string(),
                    "D6101-40706-60905".to_string(),
                )]),
            };
            RuleResult {
                kind: rule.kind,
                name: rule.name.clone(),
                fields,
            }
        })
        .collect()
}

async fn run_status(backend: &str) -> Result<()> {
    let client = ApiClient::new(backend)?;
    match client.health().await {
        Ok(health) => println!("vitad {} at {backend}: {}", health.version, health.status),
        Err(err) => println!("vitad unreachable at {backend}: {err}"),
    }
    Ok(())
}
