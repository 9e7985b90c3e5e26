//! # Example: ask/answer bridge
//!
//! Concurrent tasks ask a pool of answer workers for pages. Each `ask` suspends
//! only its own task until the answer is ready.

use std::sync::Arc;
use std::time::Duration;

use connvisor::{AnswerPool, HandlerError, LogLevel, Logger, Respond, RespondFn, Response};

fn pages() -> Arc<dyn Respond<String>> {
    RespondFn::arc(|path: String| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        match path.as_str() {
            "/" => Ok(Response::new(200)
                .with_header("content-type", "text/plain")
                .with_body("Hello, World!")),
            "/teapot" => Ok(Response::new(418)),
            _ => Err(HandlerError::fail(format!("no page at {path}"))),
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (logger, logger_join) = Logger::spawn(Box::new(std::io::stderr()), 256, LogLevel::Info);
    let pool = Arc::new(AnswerPool::spawn(4, pages(), logger.clone()));

    let paths = ["/", "/teapot", "/missing", "/", "/", "/teapot"];
    let mut tasks = Vec::new();
    for path in paths {
        let pool = Arc::clone(&pool);
        tasks.push(tokio::spawn(async move {
            (path, pool.ask(path.to_string()).await)
        }));
    }
    for task in tasks {
        match task.await? {
            (path, Ok(res)) => println!("{path} -> {} ({} bytes)", res.status, res.body.len()),
            (path, Err(err)) => println!("{path} -> error: {err}"),
        }
    }

    println!("answers per worker: {:?}", pool.completions());
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.shutdown().await;
    }
    logger.terminate().await;
    let _ = logger_join.await?;
    Ok(())
}
