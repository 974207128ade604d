//! Localhost callback listener for the OAuth2 authorization-code flow.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::Filter;

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization successful!</h1>\
<p>You can close this window and return to Tempo.</p></body></html>";

/// Authorization code and CSRF state returned by the provider.
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// One-shot server for `http://127.0.0.1:{port}/callback`.
///
/// Bound before the browser opens so the redirect cannot race the listener;
/// shuts down once a redirect has been captured.
pub struct CallbackListener {
    addr: SocketAddr,
    rx: oneshot::Receiver<CallbackParams>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind the listener. Port 0 picks a free port; see [`Self::addr`].
    ///
    /// Fails instead of panicking when the port is already occupied.
    pub fn bind(port: u16) -> Result<Self> {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let routes = warp::get()
            .and(warp::path("callback"))
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::any().map(move || tx.clone()))
            .and_then(
                |params: HashMap<String, String>,
                 tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<CallbackParams>>>>| async move {
                    let reply = CallbackParams {
                        code: params.get("code").cloned().unwrap_or_default(),
                        state: params.get("state").cloned().unwrap_or_default(),
                    };

                    if let Some(sender) = tx.lock().await.take() {
                        let _ = sender.send(reply);
                    }

                    Ok::<_, warp::Rejection>(warp::reply::html(SUCCESS_PAGE))
                },
            );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(([127, 0, 0, 1], port), async {
                let _ = shutdown_rx.await;
            })
            .context("Failed to bind OAuth callback port")?;
        let handle = tokio::spawn(server);

        Ok(Self {
            addr,
            rx,
            shutdown_tx,
            handle,
        })
    }

    /// Address the listener actually bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for one redirect, then stop listening and return its parameters.
    pub async fn recv(self) -> Result<CallbackParams> {
        let params = self.rx.await.context("Failed to receive OAuth callback")?;

        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;

        Ok(params)
    }
}
