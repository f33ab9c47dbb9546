pub mod user;
pub mod video;

pub use user::{PgUserStore, UserStore};
pub use video::{PgVideoStore, VideoStore};
