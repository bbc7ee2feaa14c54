use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use taskwarden::autolaunch::{AutoLaunchService, LoginItemAutoLaunch, NullAutoLaunch};
use taskwarden::cli::{Cli, ProtocolBridge};
use taskwarden::config::Profile;
use taskwarden::error::Result;
use taskwarden::instance::InstanceLock;
use taskwarden::lockdown::{EngineHandle, LockState, LockdownEngine};
use taskwarden::shortcuts::MemoryRegistrar;
use taskwarden::store::JsonFileStore;
use taskwarden::surface::MemorySurface;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("taskwarden: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("taskwarden=debug")
    } else {
        EnvFilter::new("taskwarden=info")
    };

    // stdout belongs to the protocol bridge
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let profile = Profile::load(cli.profile.into(), cli.overrides.as_deref()).await?;
    info!(
        profile = %profile.kind,
        data_dir = %cli.data_dir.display(),
        "Starting taskwarden"
    );

    let instance = InstanceLock::new(&cli.data_dir);
    let _instance_guard = instance.acquire().await?;

    // Reference host wiring: surfaces and shortcuts stay in-process here;
    // a shell embedding the crate supplies real implementations.
    let provider = Arc::new(MemorySurface::new());
    let registrar = Arc::new(MemoryRegistrar::new());
    let store = Arc::new(JsonFileStore::new(cli.data_dir.join("store.json")));
    let autolaunch: Arc<dyn AutoLaunchService> =
        match LoginItemAutoLaunch::for_current_exe("taskwarden") {
            Ok(service) => Arc::new(service),
            Err(e) => {
                warn!(error = %e, "Login items unavailable, auto-launch disabled");
                Arc::new(NullAutoLaunch)
            }
        };

    let (engine, handle) = LockdownEngine::new(profile, provider, registrar, store, autolaunch);
    let bridge_task = tokio::spawn(ProtocolBridge::new(handle.clone()).run());

    let result = tokio::select! {
        result = engine.run() => result,
        _ = wait_for_allowed_interrupt(handle.clone()) => Ok(()),
    };

    bridge_task.abort();
    result
}

/// Resolve on the first interrupt that arrives while enforcement is not
/// active. Interrupts during `Locked` are part of what the lockdown
/// deters, so they are logged and swallowed.
async fn wait_for_allowed_interrupt(handle: EngineHandle) {
    loop {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        if handle.state() == LockState::Locked {
            warn!("Interrupt ignored while lockdown is active");
            continue;
        }
        info!("Interrupt accepted outside enforcement");
        return;
    }
}
