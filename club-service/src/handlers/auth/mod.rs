pub mod oauth;
pub mod password;
pub mod session;

pub use oauth::{callback, login};
pub use password::{password_login, register};
pub use session::{logout, me};
