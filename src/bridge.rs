//! Runtime wiring for the two bridge activities.
//!
//! [`Bridge`] spawns the reconnect loop as a Tokio task and the reader on the
//! blocking pool. Both observe one [`CancellationToken`]; the bridge cancels
//! it when the shutdown future resolves, waits for both activities, and then
//! closes the connection.

use std::{future::Future, sync::Arc, time::Duration};

use log::{error, info};
use tokio::{runtime::Handle, signal, task};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::BridgeConfig,
    connection::{ConnectionManager, Connector, TcpConnector},
    error::BridgeError,
    forwarder::Forwarder,
    frame::MessageFramer,
    line::LineAssembler,
    reader::{LinePipeline, ReaderOptions, run_reader},
    serial::ByteSource,
};

/// A configured serial-to-TCP bridge.
pub struct Bridge<C: Connector> {
    manager: Arc<ConnectionManager<C>>,
    framer: MessageFramer,
    max_line_length: usize,
    retry_delay: Duration,
    reader: ReaderOptions,
}

impl Bridge<TcpConnector> {
    /// Build a bridge that connects over TCP as described by `config`.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        let connector = TcpConnector::new(config.remote.host.clone(), config.remote.port);
        Self::with_connector(connector, config)
    }
}

impl<C: Connector> Bridge<C> {
    /// Build a bridge using `connector` for the outbound connection and the
    /// remaining settings from `config`.
    #[must_use]
    pub fn with_connector(connector: C, config: &BridgeConfig) -> Self {
        let manager = ConnectionManager::new(connector)
            .with_connect_timeout(config.remote.connect_timeout())
            .with_write_timeout(config.remote.write_timeout());
        Self {
            manager: Arc::new(manager),
            framer: MessageFramer::new(
                config.framing.header.clone(),
                config.framing.footer.clone(),
            ),
            max_line_length: config.serial.max_line_length,
            retry_delay: config.remote.retry_delay(),
            reader: ReaderOptions {
                poll_interval: config.serial.poll_interval(),
            },
        }
    }

    /// The connection manager shared by both activities.
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager<C>> { &self.manager }

    /// Run until Ctrl+C is received.
    ///
    /// See [`Bridge::run_with_shutdown`].
    pub async fn run<S, O>(self, open_source: O)
    where
        S: ByteSource,
        O: FnOnce() -> Result<S, BridgeError> + Send + 'static,
    {
        self.run_with_shutdown(open_source, async {
            let _ = signal::ctrl_c().await;
        })
        .await;
    }

    /// Run both activities until `shutdown` resolves.
    ///
    /// `open_source` runs on the reader's blocking thread. If it fails the
    /// error is logged and only the reader stops; the reconnect loop keeps
    /// the connection alive until shutdown.
    pub async fn run_with_shutdown<S, O, F>(self, open_source: O, shutdown: F)
    where
        S: ByteSource,
        O: FnOnce() -> Result<S, BridgeError> + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let Bridge {
            manager,
            framer,
            max_line_length,
            retry_delay,
            reader,
        } = self;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        {
            let manager = Arc::clone(&manager);
            let token = token.clone();
            tracker.spawn(async move { manager.run_reconnect_loop(retry_delay, token).await });
        }

        {
            let forwarder = Forwarder::new(Arc::clone(&manager));
            let pipeline = LinePipeline::new(
                LineAssembler::with_max_line_length(max_line_length),
                framer,
            );
            let token = token.clone();
            let runtime = Handle::current();
            tracker.spawn(async move {
                let joined = task::spawn_blocking(move || match open_source() {
                    Ok(source) => {
                        run_reader(source, pipeline, &forwarder, reader, &token, &runtime);
                    }
                    Err(e) => error!("reader stopped: error={e}"),
                })
                .await;
                if let Err(e) = joined {
                    error!("reader task failed: error={e}");
                }
            });
        }

        info!("bridge running: peer={}", manager.connector().peer());
        shutdown.await;

        token.cancel();
        tracker.close();
        tracker.wait().await;
        manager.disconnect().await;
        info!("bridge stopped");
    }
}
