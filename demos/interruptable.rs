//! # Example: interruptable workers
//!
//! Each connection gets a slow drip of lines. Stopping the supervisor cancels the
//! drips still in flight instead of waiting for them.

use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use connvisor::{
    Config, DispatchMode, HandlerError, HandlerFn, HandlerRef, Supervisor, WorkerKind,
};

fn drip() -> HandlerRef {
    HandlerFn::arc("drip", |conn, _ctx| {
        async move {
            for i in 0.. {
                let line = format!("tick {i}\n");
                conn.stream_mut().write_all(line.as_bytes()).await?;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok::<_, HandlerError>(())
        }
        .boxed()
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut cfg = Config::default();
    cfg.endpoint = "127.0.0.1:0".into();
    cfg.pool_size = 2;
    cfg.dispatch = DispatchMode::PushSelect;
    cfg.worker = WorkerKind::Interruptable;

    let mut sup = Supervisor::builder(cfg, drip()).build();
    sup.start().await?;
    let addr = sup
        .local_addr()
        .ok_or_else(|| anyhow::anyhow!("no bound address"))?;

    let mut clients = Vec::new();
    for n in 0..2 {
        clients.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await?;
            let mut lines = BufReader::new(stream).lines();
            let mut seen = 0;
            while let Some(line) = lines.next_line().await? {
                println!("[client {n}] {line}");
                seen += 1;
            }
            anyhow::Ok(seen)
        }));
    }

    tokio::time::sleep(Duration::from_millis(350)).await;
    sup.stop().await?;

    for client in clients {
        let seen = client.await??;
        println!("client saw {seen} lines before the connection was cancelled");
    }
    Ok(())
}
