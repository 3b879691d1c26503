//! 阻塞发射的取消信号。
//!
//! 取消通过关闭一个永不发送消息的通道实现：所有克隆出的接收端
//! 同时观察到断开，因此不存在唤醒丢失。
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// A cloneable, one-shot cancellation signal for [`crate::net::Net::fire_cancellable`].
///
/// Every clone observes the same cancellation. Once cancelled a token stays
/// cancelled.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn cancel(&self) {
        if self.sender.lock().take().is_some() {
            log::debug!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Becomes ready (disconnected) once the token is cancelled.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn receiver_disconnects_on_cancel() {
        let token = CancelToken::new();
        assert!(
            token
                .receiver()
                .recv_timeout(Duration::from_millis(5))
                .is_err()
        );
        assert!(token.receiver().try_recv().is_err());
        token.cancel();
        assert_eq!(
            token.receiver().recv(),
            Err(crossbeam_channel::RecvError)
        );
    }
}
