mod accessory;
mod command_bridge;
mod guard;
mod host;
mod link;
mod reconcile;
mod registry;
mod simulated;
mod thermostat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
