//! Application wiring: telemetry, options and the supervisor.

use std::sync::Arc;

use anyhow::{bail, Context};
use janus_server::{AdapterRegistry, ShutdownSignal, Supervisor};
use janus_telemetry::init_telemetry;

use crate::cli::Args;

/// Instrumentation scope of the per-request server spans.
const TRACER_NAME: &str = "janus";

/// Runs the service until a shutdown signal arrives or the supervisor fails.
///
/// # Errors
///
/// Returns an error if the initial framework is unknown, telemetry cannot be
/// initialized, or the supervisor ends with an error.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let registry = AdapterRegistry::with_defaults();
    check_framework(&registry, &args.framework)?;

    let log_level = args.log_level_control();
    let telemetry = init_telemetry(&args.telemetry_config(), &log_level)
        .context("failed to initialize telemetry")?;

    let mut options = args.options_builder(log_level);
    if let Some(metrics) = telemetry.metrics.clone() {
        options = options.metrics(metrics);
    }
    if let Some(provider) = telemetry.tracer_provider() {
        options = options
            .tracer(janus_telemetry::tracing::tracer(TRACER_NAME))
            .tracer_provider(provider.clone());
    }
    let options = Arc::new(options.build());

    tracing::info!(
        version = crate::VERSION,
        service = %options.service_name(),
        addr = %options.listen_addr(),
        framework = %args.framework,
        policy = ?args.policy(),
        "Starting janus"
    );

    let supervisor = Supervisor::new(registry, options)
        .with_policy(args.policy())
        .with_shutdown(ShutdownSignal::with_os_signals())
        .spawn()
        .await;

    supervisor
        .switch(args.framework.clone())
        .await
        .context("supervisor exited before receiving the initial framework")?;
    supervisor.join().await.context("supervisor failed")?;

    tracing::info!("Janus stopped");
    drop(telemetry);
    Ok(())
}

/// Rejects an initial framework nothing is registered under.
fn check_framework(registry: &AdapterRegistry, framework: &str) -> anyhow::Result<()> {
    if !registry.contains(framework) {
        bail!(
            "unknown framework '{framework}' (expected one of: {})",
            registry.names().join(", ")
        );
    }
    Ok(())
}
