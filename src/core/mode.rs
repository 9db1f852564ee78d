use tokio::sync::watch;

/// Shared live/check-in mode.
///
/// There is exactly one [`ModeSwitch`]; any number of [`ModeWatch`] readers can follow it.
pub struct CheckInMode;

impl CheckInMode {
    pub fn new(live: bool) -> (ModeSwitch, ModeWatch) {
        let (tx, rx) = watch::channel(live);
        (ModeSwitch { tx }, ModeWatch { rx })
    }
}

/// The single writer of the live mode
pub struct ModeSwitch {
    tx: watch::Sender<bool>,
}

impl ModeSwitch {
    /// Sets the mode. Readers are only woken when the value actually changes.
    pub fn set(&self, live: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == live {
                false
            } else {
                *current = live;
                true
            }
        });

        if changed {
            log::info!("Live mode {}", if live { "enabled" } else { "disabled" });
        }
    }

    pub fn toggle(&self) -> bool {
        let live = !*self.tx.borrow();
        self.set(live);
        live
    }

    pub fn is_live(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> ModeWatch {
        ModeWatch {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct ModeWatch {
    rx: watch::Receiver<bool>,
}

impl ModeWatch {
    pub fn is_live(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next change and returns the new mode.
    ///
    /// Errors once the [`ModeSwitch`] is gone.
    pub async fn changed(&mut self) -> anyhow::Result<bool> {
        self.rx.changed().await?;
        Ok(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_readers_follow_switch() {
        let (switch, watch) = CheckInMode::new(false);
        let mut follower = switch.watch();

        assert!(!watch.is_live());
        switch.set(true);
        assert!(watch.is_live());
        assert_eq!(follower.changed().await.unwrap(), true);

        assert!(!switch.toggle());
        assert!(!watch.is_live());
        assert_eq!(follower.changed().await.unwrap(), false);
    }

    #[tokio::test]
    async fn test_same_value_does_not_notify() {
        let (switch, mut watch) = CheckInMode::new(true);
        switch.set(true);

        let waited = tokio::time::timeout(Duration::from_millis(50), watch.changed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_reader_errors_after_switch_dropped() {
        let (switch, mut watch) = CheckInMode::new(false);
        drop(switch);
        assert!(watch.changed().await.is_err());
    }
}
