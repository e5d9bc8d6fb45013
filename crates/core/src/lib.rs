pub mod detection;
pub mod notification;
pub mod overlay;
pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod video;
