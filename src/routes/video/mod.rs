mod handler;
mod model;

pub use handler::{delete_video, get_video, publish_video, toggle_publish_status, update_video};
