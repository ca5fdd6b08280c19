pub mod extract;
pub mod scan;

use tokio_util::sync::CancellationToken;

/// A token that is cancelled on the first Ctrl-C.
pub(crate) fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current file");
            trigger.cancel();
        }
    });
    token
}
