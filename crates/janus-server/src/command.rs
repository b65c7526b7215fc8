//! The command channel feeding the supervisor.
//!
//! Sending is a rendezvous: [`CommandSender::send`] returns only once the
//! supervisor has taken the framework name off the channel. There is no
//! queueing or coalescing beyond that; a second sender waits its turn.

use tokio::sync::{mpsc, oneshot, watch};

use crate::adapter::AdapterToken;
use crate::error::SupervisorError;

/// The adapter currently serving, as published by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFramework {
    /// Token of the running adapter instance.
    pub token: AdapterToken,
    /// Registry name of the running adapter.
    pub framework: String,
    /// Address the adapter bound.
    pub local_addr: Option<std::net::SocketAddr>,
}

struct Command {
    framework: String,
    received: oneshot::Sender<()>,
}

/// Cloneable sending half of the command channel.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
    active: watch::Receiver<Option<ActiveFramework>>,
}

impl CommandSender {
    /// Sends a framework name and waits for the supervisor to receive it.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Closed`] if the supervisor has exited, or
    /// exits before receiving the name.
    pub async fn send(&self, framework: impl Into<String>) -> Result<(), SupervisorError> {
        let (received, ack) = oneshot::channel();
        self.tx
            .send(Command {
                framework: framework.into(),
                received,
            })
            .await
            .map_err(|_| SupervisorError::Closed)?;
        ack.await.map_err(|_| SupervisorError::Closed)
    }

    /// Sends on behalf of the adapter identified by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::StaleHandle`] if `token` is not the active
    /// adapter, or [`SupervisorError::Closed`] as for [`send`](Self::send).
    pub async fn send_as(
        &self,
        token: AdapterToken,
        framework: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        self.check_current(token)?;
        self.send(framework).await
    }

    /// Fails with [`SupervisorError::StaleHandle`] unless `token` is active.
    pub fn check_current(&self, token: AdapterToken) -> Result<(), SupervisorError> {
        let current = self.active.borrow().as_ref().map(|a| a.token.generation);
        if current == Some(token.generation) {
            Ok(())
        } else {
            Err(SupervisorError::StaleHandle {
                token: token.generation,
                current,
            })
        }
    }

    /// Returns the adapter currently serving.
    #[must_use]
    pub fn active(&self) -> Option<ActiveFramework> {
        self.active.borrow().clone()
    }

    /// Subscribes to changes of the active adapter.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveFramework>> {
        self.active.clone()
    }

    /// Returns `true` once the supervisor has stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSender")
            .field("closed", &self.tx.is_closed())
            .field("active", &*self.active.borrow())
            .finish()
    }
}

/// Receiving half, owned by the supervisor.
pub(crate) struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
    active: watch::Sender<Option<ActiveFramework>>,
}

impl CommandReceiver {
    /// Receives the next framework name and releases its sender.
    pub(crate) async fn recv(&mut self) -> Option<String> {
        let command = self.rx.recv().await?;
        // The sender may have given up waiting.
        let _ = command.received.send(());
        Some(command.framework)
    }

    /// Publishes the active adapter.
    pub(crate) fn set_active(&self, active: Option<ActiveFramework>) {
        self.active.send_replace(active);
    }

    /// Stops receiving; pending and future sends fail with `Closed`.
    pub(crate) fn close(&mut self) {
        self.rx.close();
        self.set_active(None);
    }
}

/// Creates a rendezvous command channel.
pub(crate) fn channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(1);
    let (active_tx, active_rx) = watch::channel(None);
    (
        CommandSender {
            tx,
            active: active_rx,
        },
        CommandReceiver {
            rx,
            active: active_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_waits_for_receipt() {
        let (tx, mut rx) = channel();

        let send = tokio::spawn(async move { tx.send("axum").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!send.is_finished(), "send must block until received");

        assert_eq!(rx.recv().await.as_deref(), Some("axum"));
        send.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (tx, mut rx) = channel();
        rx.close();

        assert!(matches!(tx.send("hyper").await, Err(SupervisorError::Closed)));
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_buffered_command_dropped_on_close() {
        let (tx, rx) = channel();

        let send = tokio::spawn(async move { tx.send("hyper").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(rx);

        let result = send.await.unwrap();
        assert!(matches!(result, Err(SupervisorError::Closed)));
    }

    #[tokio::test]
    async fn test_send_as_rejects_stale_token() {
        let (tx, rx) = channel();
        let current = AdapterToken { generation: 2 };
        rx.set_active(Some(ActiveFramework {
            token: current,
            framework: "hyper".to_string(),
            local_addr: None,
        }));

        let err = tx
            .send_as(AdapterToken { generation: 1 }, "axum")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::StaleHandle {
                token: 1,
                current: Some(2)
            }
        ));
        assert!(tx.check_current(current).is_ok());
    }

    #[tokio::test]
    async fn test_active_is_observable() {
        let (tx, rx) = channel();
        let mut changes = tx.subscribe();
        assert!(tx.active().is_none());

        rx.set_active(Some(ActiveFramework {
            token: AdapterToken { generation: 1 },
            framework: "auto".to_string(),
            local_addr: None,
        }));

        changes.changed().await.unwrap();
        assert_eq!(tx.active().unwrap().framework, "auto");
    }
}
