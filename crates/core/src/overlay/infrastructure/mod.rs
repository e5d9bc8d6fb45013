pub mod display_list_surface;
pub mod raster_surface;
