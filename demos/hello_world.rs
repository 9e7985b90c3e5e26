//! # Example: Hello World server
//!
//! Answers every connection with `Hello, World!` until SIGINT/SIGTERM.
//!
//! ```text
//! cargo run --example hello_world
//! curl http://127.0.0.1:10001/
//! ```

use futures::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use connvisor::{Config, HandlerError, HandlerFn, HandlerRef, LogLevel, Supervisor};

const BODY: &str = "Hello, World!";

fn hello() -> HandlerRef {
    HandlerFn::arc("hello", |conn, _ctx| {
        async move {
            // Read (and ignore) whatever request the client sent first.
            let mut buf = [0u8; 1024];
            let _ = conn.stream_mut().read(&mut buf).await?;

            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{BODY}",
                BODY.len()
            );
            conn.stream_mut().write_all(reply.as_bytes()).await?;
            Ok::<_, HandlerError>(())
        }
        .boxed()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = Config::default();
    cfg.pool_size = 4;
    cfg.log_level = LogLevel::Debug;

    let mut sup = Supervisor::builder(cfg, hello()).build();
    sup.serve().await?;

    for (worker, served) in sup.completions() {
        println!("{worker}: {served} connections");
    }
    Ok(())
}
