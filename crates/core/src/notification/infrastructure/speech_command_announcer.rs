use std::process::{Child, Command, Stdio};

use crate::notification::domain::announcer::Announcer;

/// Speaks greetings through an external text-to-speech command
/// (`say` on macOS, `espeak` on Linux).
///
/// The command is spawned with the message as its last argument and is not
/// waited on; finished children are reaped on the next call.
pub struct SpeechCommandAnnouncer {
    program: String,
    args: Vec<String>,
    speaking: Vec<Child>,
}

impl SpeechCommandAnnouncer {
    /// Parses a whitespace-separated command line such as `"espeak -s 150"`.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            speaking: Vec::new(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn reap(&mut self) {
        self.speaking
            .retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_)) | Err(_)));
    }
}

impl Announcer for SpeechCommandAnnouncer {
    fn announce(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.reap();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to run speech command '{}': {e}", self.program))?;
        self.speaking.push(child);
        Ok(())
    }
}

impl Drop for SpeechCommandAnnouncer {
    fn drop(&mut self) {
        for child in &mut self.speaking {
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let announcer = SpeechCommandAnnouncer::from_command_line("espeak -s 150").unwrap();
        assert_eq!(announcer.program(), "espeak");
        assert_eq!(announcer.args, vec!["-s", "150"]);
    }

    #[test]
    fn test_blank_command_line() {
        assert!(SpeechCommandAnnouncer::from_command_line("   ").is_none());
    }

    #[test]
    fn test_missing_program_fails() {
        let mut announcer =
            SpeechCommandAnnouncer::from_command_line("facewatch-no-such-speech-program").unwrap();
        assert!(announcer.announce("Hello").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_finished_children_are_reaped() {
        let mut announcer = SpeechCommandAnnouncer::from_command_line("true").unwrap();
        announcer.announce("Hello Alice").unwrap();
        for child in &mut announcer.speaking {
            child.wait().unwrap();
        }
        announcer.announce("Hello Bob").unwrap();
        assert_eq!(announcer.speaking.len(), 1);
    }
}
