//! Run a BSC device from a config file

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;
use xap_device::{Device, DeviceConfig, EndpointChange};
use xap_transport::ServerHandle;

pub async fn run_device(
    server: &ServerHandle,
    path: &Path,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let config = DeviceConfig::load(path)
        .with_context(|| format!("Failed to load device config {}", path.display()))?;
    let mut device = config.build().context("Invalid device config")?;
    let mut changes = device.watch();

    println!(
        "{} Running {} ({}) with {} outputs and {} inputs",
        "xAP".cyan().bold(),
        device.address().to_string().yellow(),
        device.uid(),
        device.output_count(),
        device.input_count()
    );
    for endpoint in device.endpoints() {
        println!(
            "  {:02X} {:<6} {}",
            endpoint.uid(),
            if endpoint.is_output() { "output" } else { "input" },
            endpoint.name()
        );
    }

    let id = server.add_device(device).await?;
    info!("Device added as {}", id);

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Some(change) => print_change(&change),
                None => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }

    server.remove_device(id).await?;
    Ok(())
}

fn print_change(change: &EndpointChange) {
    let values = &change.values;
    let mut line = format!("State={}", values.state.as_str());
    if let Some(level) = values.level {
        line.push_str(&format!(" Level={}", level));
    }
    if let Some(text) = &values.text {
        line.push_str(&format!(" Text={}", text));
    }
    if let Some(display_text) = &values.display_text {
        line.push_str(&format!(" DisplayText={}", display_text));
    }
    println!(
        "{} {} ({:02X}) {}",
        "CHANGE".green().bold(),
        change.name.yellow(),
        change.uid,
        line
    );
}
