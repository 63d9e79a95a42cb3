use cupom_bridge::{Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. .env, configuration, logging
    let config = setup_environment()?;

    print_banner();

    tracing::info!("🖨️  Cupom bridge starting...");

    // 2. Print strategies + cleanup queue
    let state = ServerState::initialize(&config);

    // 3. HTTP server, returns after ctrl-c and temp file flush
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
