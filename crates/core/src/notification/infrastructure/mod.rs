pub mod log_announcer;
pub mod speech_command_announcer;
