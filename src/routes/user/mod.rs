mod handler;
mod model;

pub use handler::{
    REFRESH_TOKEN_COOKIE,
    current_user,
    login,
    logout,
    refresh_token,
    register,
    update_avatar,
    update_cover_image,
};
