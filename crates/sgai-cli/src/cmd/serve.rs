use anyhow::Context;
use sgai_server::AppState;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = super::load_config(root, None)?;
    let mut server = config.server;
    if let Some(p) = port {
        server.port = p;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port))
            .await
            .with_context(|| format!("failed to bind port {}", server.port))?;
        let actual_port = listener.local_addr()?.port();
        println!("sgai hub → http://localhost:{actual_port}  (PID {})", std::process::id());

        tokio::select! {
            res = sgai_server::serve_on(listener, AppState::from_config(&server)) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
