pub mod build_gallery_use_case;
pub mod cycle_logger;
pub mod detection_cycle;
pub mod detection_scheduler;
