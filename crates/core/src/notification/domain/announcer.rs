/// Domain interface for speaking a greeting out loud.
///
/// Implementations should return quickly; the detection loop waits on them.
pub trait Announcer: Send {
    fn announce(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>>;
}
