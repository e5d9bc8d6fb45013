pub mod announcer;
pub mod notification_throttler;
pub mod throttle_state;
