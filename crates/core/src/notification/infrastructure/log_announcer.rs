use crate::notification::domain::announcer::Announcer;

/// Writes greetings to the log instead of speaking them.
///
/// Used when no speech command is configured or speech is disabled.
#[derive(Debug, Default)]
pub struct LogAnnouncer {
    announced: usize,
}

impl LogAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announced(&self) -> usize {
        self.announced
    }
}

impl Announcer for LogAnnouncer {
    fn announce(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.announced += 1;
        log::info!("Announcement: {message}");
        Ok(())
    }
}
