use std::future::Future;

use anyhow::Result;
use tokio::signal::unix::{self, SignalKind};

pub const TERMINATION_SIGNALS: [libc::c_int; 5] = [
    libc::SIGINT,
    libc::SIGTERM,
    libc::SIGQUIT,
    libc::SIGABRT,
    libc::SIGTSTP,
];

/// Drives `f` until it finishes or a termination signal arrives.
pub async fn run_or_terminate<F>(f: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let run_fut = tokio::spawn(f);
    tokio::select! {
        res = run_fut => res?,
        signal = wait_for_any(TERMINATION_SIGNALS) => {
            let signal = signal?;
            tracing::info!(signal = signal.as_raw_value(), "received termination signal");
            Ok(())
        }
    }
}

async fn wait_for_any<I>(signals: I) -> std::io::Result<SignalKind>
where
    I: IntoIterator<Item = libc::c_int>,
{
    let mut streams = Vec::new();
    for raw in signals {
        let kind = SignalKind::from_raw(raw);
        streams.push((kind, unix::signal(kind)?));
    }

    let (kind, _, _) = futures_util::future::select_all(streams.iter_mut().map(|(kind, stream)| {
        let kind = *kind;
        Box::pin(async move {
            stream.recv().await;
            kind
        })
    }))
    .await;

    Ok(kind)
}
