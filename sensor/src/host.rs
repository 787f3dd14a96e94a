use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use heater_common::{CommandResponse, DEFAULT_HTTP_PORT, TEMP_COMMAND};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bridge_url = std::env::var("BRIDGE_URL")
        .unwrap_or_else(|_| format!("http://127.0.0.1:{DEFAULT_HTTP_PORT}"));
    let device_id =
        std::env::var("SENSOR_DEVICE_ID").context("SENSOR_DEVICE_ID must name a heater")?;
    let interval_secs = std::env::var("SENSOR_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(30);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    info!("sensor reporting to {bridge_url} for device {device_id} every {interval_secs}s");

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);

        // Hardware integration point:
        // replace this simulated reading with a DS18B20 driver.
        let temperature_c = simulated_reading(tick);
        let url = reading_url(&bridge_url, &device_id, temperature_c);

        match report(&client, &url).await {
            Ok(response) if response.error => warn!("bridge rejected reading: {}", response.message),
            Ok(response) => info!("{}", response.message),
            Err(err) => warn!("failed to report reading to {url}: {err:#}"),
        }
    }
}

async fn report(client: &reqwest::Client, url: &str) -> anyhow::Result<CommandResponse> {
    let response = client
        .get(url)
        .send()
        .await
        .context("bridge request failed")?
        .json::<CommandResponse>()
        .await
        .context("bridge reply was not a command response")?;
    Ok(response)
}

fn simulated_reading(tick: u64) -> f32 {
    19.0 + ((tick % 8) as f32 * 0.2)
}

/// Bridge path for one reading, with the degree unit percent-encoded the way
/// wall sensors send it.
fn reading_url(base: &str, device_id: &str, temperature_c: f32) -> String {
    format!(
        "{}/{TEMP_COMMAND}/{device_id}/{temperature_c:.1}%C2%B0C",
        base.trim_end_matches('/')
    )
}
