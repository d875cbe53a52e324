//! Single-consumer request processor.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::device::{DeviceDirectory, DeviceError};
use crate::observability::metrics;
use crate::request::WakeRequest;
use crate::wol::{WakeSender, WolError};

/// Why a request was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A device name was given but no directory was loaded.
    #[error("device '{0}' requested but no device configuration is loaded")]
    DirectoryUnavailable(String),

    /// The device name is not in the directory.
    #[error(transparent)]
    UnknownDevice(#[from] DeviceError),

    /// The request reached neither a device nor an address pair.
    #[error("request has no target")]
    NoTarget,

    /// Packet construction or transmission failed.
    #[error("failed to send WOL packet to {mac} via {broadcast}: {source}")]
    Send {
        mac: String,
        broadcast: String,
        #[source]
        source: WolError,
    },
}

impl DispatchError {
    fn reason(&self) -> &'static str {
        match self {
            DispatchError::DirectoryUnavailable(_) => "no_directory",
            DispatchError::UnknownDevice(_) => "unknown_device",
            DispatchError::NoTarget => "no_target",
            DispatchError::Send { source, .. } => source.kind(),
        }
    }
}

/// The addresses a request was sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub mac: String,
    pub broadcast: String,
}

/// Drains the request queue and sends one magic packet per request.
pub struct Dispatcher {
    directory: Option<Arc<DeviceDirectory>>,
    sender: Arc<dyn WakeSender>,
    span: Span,
}

impl Dispatcher {
    pub fn new(directory: Option<Arc<DeviceDirectory>>, sender: Arc<dyn WakeSender>) -> Self {
        Self {
            directory,
            sender,
            span: tracing::info_span!("dispatcher"),
        }
    }

    /// Consume requests until the queue closes or `cancel` fires.
    ///
    /// After cancellation the receiver is closed and whatever was already
    /// queued is still dispatched.
    pub async fn run(self, mut queue: mpsc::Receiver<WakeRequest>, cancel: CancellationToken) {
        tracing::info!(parent: &self.span, "Request processor started");

        loop {
            tokio::select! {
                biased;
                request = queue.recv() => match request {
                    Some(request) => self.process(request).await,
                    None => {
                        tracing::info!(parent: &self.span, "Request channel closed, stopping processor");
                        return;
                    }
                },
                _ = cancel.cancelled() => {
                    tracing::info!(parent: &self.span, "Request processor context canceled");
                    break;
                }
            }
        }

        queue.close();
        let mut drained = 0usize;
        while let Some(request) = queue.recv().await {
            self.process(request).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(parent: &self.span, drained, "Dispatched requests queued before shutdown");
        }
    }

    async fn process(&self, request: WakeRequest) {
        let source = request.source;
        let device = request.device_name.clone().unwrap_or_default();

        match self.handle(&request).await {
            Ok(sent) => {
                metrics::record_packet_sent();
                tracing::info!(
                    parent: &self.span,
                    mac = %sent.mac,
                    broadcast = %sent.broadcast,
                    device = %device,
                    source = source,
                    "Successfully sent WOL packet"
                );
            }
            Err(e) => {
                match &e {
                    DispatchError::Send { .. } => metrics::record_packet_failed(e.reason()),
                    _ => metrics::record_request_dropped(source, e.reason()),
                }
                tracing::error!(
                    parent: &self.span,
                    device = %device,
                    mac = request.hardware_address.as_deref().unwrap_or_default(),
                    broadcast = request.broadcast_address.as_deref().unwrap_or_default(),
                    source = source,
                    error = %e,
                    "Dropping wakeup request"
                );
            }
        }
    }

    /// Resolve and send a single request.
    ///
    /// A device name always wins over literal addresses in the same request.
    pub async fn handle(&self, request: &WakeRequest) -> Result<Dispatched, DispatchError> {
        let (mac, broadcast) = match request.device_name.as_deref() {
            Some(name) => {
                let directory = self
                    .directory
                    .as_deref()
                    .ok_or_else(|| DispatchError::DirectoryUnavailable(name.to_string()))?;
                let device = directory.resolve(name)?;
                tracing::info!(
                    parent: &self.span,
                    device = %name,
                    mac = %device.mac,
                    broadcast = %device.broadcast,
                    source = request.source,
                    "Resolved device name to MAC address"
                );
                (device.mac.clone(), device.broadcast.clone())
            }
            None => match (&request.hardware_address, &request.broadcast_address) {
                (Some(mac), Some(broadcast)) => {
                    tracing::info!(
                        parent: &self.span,
                        mac = %mac,
                        broadcast = %broadcast,
                        source = request.source,
                        "Using direct MAC address"
                    );
                    (mac.clone(), broadcast.clone())
                }
                _ => return Err(DispatchError::NoTarget),
            },
        };

        self.sender
            .send(&mac, &broadcast)
            .await
            .map_err(|source| DispatchError::Send {
                mac: mac.clone(),
                broadcast: broadcast.clone(),
                source,
            })?;

        Ok(Dispatched { mac, broadcast })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::device::Device;
    use crate::request::WakePayload;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl WakeSender for RecordingSender {
        async fn send(&self, mac: &str, broadcast: &str) -> Result<(), WolError> {
            let _: crate::wol::HardwareAddr = mac.parse()?;
            self.sent
                .lock()
                .unwrap()
                .push((mac.to_string(), broadcast.to_string()));
            Ok(())
        }
    }

    fn directory() -> Arc<DeviceDirectory> {
        Arc::new(
            DeviceDirectory::from_devices(vec![Device::new(
                "desktop",
                "00:11:22:33:44:55",
                "192.168.1.255",
            )])
            .unwrap(),
        )
    }

    fn request(payload: WakePayload) -> WakeRequest {
        WakeRequest::new("HTTP", payload).unwrap()
    }

    #[tokio::test]
    async fn test_device_resolution_takes_precedence() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(Some(directory()), sender.clone());

        let payload = WakePayload {
            device: "desktop".into(),
            mac: "aa:bb:cc:dd:ee:ff".into(),
            broadcast: "10.0.0.255".into(),
        };
        let sent = dispatcher.handle(&request(payload)).await.unwrap();

        assert_eq!(
            sent,
            Dispatched {
                mac: "00:11:22:33:44:55".into(),
                broadcast: "192.168.1.255".into()
            }
        );
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_direct_addresses_used_without_device() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(None, sender.clone());

        let sent = dispatcher
            .handle(&request(WakePayload::for_address("aa:bb:cc:dd:ee:ff", "10.0.0.255")))
            .await
            .unwrap();
        assert_eq!(sent.broadcast, "10.0.0.255");
    }

    #[tokio::test]
    async fn test_missing_directory_drops_named_request() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(None, sender.clone());

        let err = dispatcher
            .handle(&request(WakePayload::for_device("desktop")))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::DirectoryUnavailable(ref n) if n == "desktop"));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_device_dropped() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(Some(directory()), sender.clone());

        let err = dispatcher
            .handle(&request(WakePayload::for_device("laptop")))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownDevice(DeviceError::NotFound(_))));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mac_surfaces_send_error() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(None, sender.clone());

        let err = dispatcher
            .handle(&request(WakePayload::for_address("not-a-mac", "10.0.0.255")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Send {
                source: WolError::InvalidHardwareAddress(_),
                ..
            }
        ));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_cancel() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(Some(directory()), sender.clone());
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            tx.send(request(WakePayload::for_device("desktop"))).await.unwrap();
        }
        tx.send(request(WakePayload::for_device("unknown"))).await.unwrap();
        cancel.cancel();

        dispatcher.run(rx, cancel).await;
        assert_eq!(sender.sent.lock().unwrap().len(), 3);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_run_stops_when_queue_closes() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(None, sender.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(request(WakePayload::for_address("aa:bb:cc:dd:ee:ff", "10.0.0.255")))
            .await
            .unwrap();
        drop(tx);

        dispatcher.run(rx, CancellationToken::new()).await;
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }
}
