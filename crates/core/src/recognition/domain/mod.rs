pub mod descriptor;
pub mod gallery;
pub mod identity_matcher;
pub mod reference_image_loader;
