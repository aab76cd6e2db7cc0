//! Feedback unit.
//!
//! Owns the character display. After a boot banner it shows a fixed title
//! on the first line and the latest status message on the second. A message
//! is blanked once after the dwell time; nothing else touches the panel.

use crate::channels::QueueReceiver;
use crate::config::FirmwareConfig;
use doorlock_core::{ControlCommand, DisplayText, Error, Result};
use doorlock_hardware::CharacterDisplay;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The feedback unit.
pub struct FeedbackUnit<D> {
    config: Arc<FirmwareConfig>,
    display: D,
    commands: QueueReceiver<ControlCommand>,
    /// When the current status message was drawn; `None` once blanked.
    rendered_at: Option<Instant>,
}

impl<D: CharacterDisplay> FeedbackUnit<D> {
    pub fn new(config: Arc<FirmwareConfig>, display: D, commands: QueueReceiver<ControlCommand>) -> Self {
        Self {
            config,
            display,
            commands,
            rendered_at: None,
        }
    }

    /// Show the banner, then run until every display producer is gone.
    ///
    /// # Errors
    ///
    /// Never returns an error today; the signature matches the other units.
    pub async fn run(mut self) -> Result<()> {
        self.show_banner().await;

        loop {
            match self.run_pass().await {
                Ok(()) => {}
                Err(Error::QueueClosed(queue)) => {
                    info!(queue, "queue closed, feedback unit stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Draw the boot banner, hold it, then draw the idle screen.
    pub async fn show_banner(&mut self) {
        let config = Arc::clone(&self.config);
        let display = &config.display;
        let drawn = async {
            self.display.clear().await?;
            self.display.set_cursor(0, 0).await?;
            self.display.print(&display.banner_title).await?;
            self.display.set_cursor(0, 1).await?;
            self.display.print(&display.banner_subtitle).await
        }
        .await;
        if let Err(e) = drawn {
            warn!(error = %e, "display banner failed");
        }

        tokio::time::sleep(display.banner()).await;

        let drawn = async {
            self.display.clear().await?;
            self.display.set_cursor(0, 0).await?;
            self.display.print(&display.title).await
        }
        .await;
        if let Err(e) = drawn {
            warn!(error = %e, "display title failed");
        }
    }

    /// One scheduling pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` once the display queue is closed.
    pub async fn run_pass(&mut self) -> Result<()> {
        let wait = self.config.display.poll();
        match self.commands.recv_timeout(wait).await? {
            Some(ControlCommand::UpdateDisplay(text)) => self.render(&text).await,
            Some(other) => debug!(command = ?other, "non-display command ignored"),
            None => {}
        }

        if let Some(at) = self.rendered_at
            && Instant::now().saturating_duration_since(at) > self.config.display.dwell()
        {
            self.blank_status().await;
        }
        Ok(())
    }

    async fn render(&mut self, text: &DisplayText) {
        let config = Arc::clone(&self.config);
        let config = &config.display;
        let line: String = text.as_str().chars().take(usize::from(config.columns)).collect();

        let drawn = async {
            self.display.clear().await?;
            self.display.set_cursor(0, 0).await?;
            self.display.print(&config.title).await?;
            self.display.set_cursor(0, 1).await?;
            self.display.print(&line).await
        }
        .await;

        match drawn {
            Ok(()) => debug!(text = %line, "display updated"),
            Err(e) => warn!(error = %e, "display update failed"),
        }
        self.rendered_at = Some(Instant::now());
    }

    async fn blank_status(&mut self) {
        let blank = " ".repeat(usize::from(self.config.display.columns));
        let drawn = async {
            self.display.set_cursor(0, 1).await?;
            self.display.print(&blank).await
        }
        .await;
        if let Err(e) = drawn {
            warn!(error = %e, "display blank failed");
        }
        self.rendered_at = None;
    }
}
