mod artifact;
mod bot_status;
mod email_log;
mod license;
mod mt5_account;
mod user;

pub use artifact::*;
pub use bot_status::*;
pub use email_log::*;
pub use license::*;
pub use mt5_account::*;
pub use user::*;
