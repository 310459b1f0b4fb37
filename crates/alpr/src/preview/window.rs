use super::{
    PreviewConfig, Previewer,
    server::{self, FrameMetadata, FramePacket, PreviewState},
};
use crate::{error::DisplayError, frame::AnnotatedFrame};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    runtime::Runtime,
    sync::{broadcast, oneshot},
    task::JoinHandle,
};

const BROADCAST_CAPACITY: usize = 4;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// The live preview surface: a page served over HTTP that renders frames
/// pushed through a WebSocket.
///
/// Runs on its own runtime so the processing thread never awaits it. Dropping
/// the window stops the server.
pub struct PreviewWindow {
    title: String,
    jpeg_quality: u8,
    local_addr: SocketAddr,
    tx: broadcast::Sender<FramePacket>,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
    runtime: Option<Runtime>,
}

impl PreviewWindow {
    pub fn open(config: &PreviewConfig) -> Result<Self, DisplayError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("preview")
            .enable_all()
            .build()
            .map_err(DisplayError::Runtime)?;

        let bind_error = |source| DisplayError::Bind {
            addr: config.addr.clone(),
            source,
        };
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(&config.addr))
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = server::router(PreviewState {
            tx: tx.clone(),
            title: Arc::from(config.title.as_str()),
        });

        let server = runtime.spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "Preview server failed");
            }
        });

        tracing::info!(
            title = %config.title,
            url = %format!("http://{}/", local_addr),
            "Preview window open"
        );

        Ok(Self {
            title: config.title.clone(),
            jpeg_quality: config.jpeg_quality,
            local_addr,
            tx,
            shutdown: Some(shutdown_tx),
            server,
            runtime: Some(runtime),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected viewers.
    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Previewer for PreviewWindow {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<(), DisplayError> {
        if self.server.is_finished() {
            return Err(DisplayError::SurfaceClosed);
        }
        if self.viewers() == 0 {
            return Ok(());
        }

        let jpeg = encode_jpeg(&frame.image, self.jpeg_quality)?;
        let packet = FramePacket {
            metadata: FrameMetadata {
                sequence: frame.sequence,
                width: frame.width(),
                height: frame.height(),
                labels: frame.labels.clone(),
                stamp: frame.stamp,
            },
            jpeg: Arc::from(jpeg),
        };

        // Only fails if every viewer left since the check above.
        let _ = self.tx.send(packet);
        Ok(())
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        }
        tracing::info!(title = %self.title, "Preview window closed");
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, DisplayError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(image)?;
    Ok(jpeg)
}
