// 业务操作模块
// 处理函数只负责提取参数与组装响应，业务流程都在这里完成

pub mod session;
pub mod user;
pub mod video;

pub use session::{LoginCredentials, LoginOutcome, SessionOperation};
pub use user::{RegistrationInput, UserOperation};
pub use video::{PublishVideoInput, UpdateVideoInput, VideoOperation};
