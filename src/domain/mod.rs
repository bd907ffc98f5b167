mod account;
mod refresh_token;

pub use account::Account;
pub use refresh_token::{PendingRefreshToken, RefreshToken, TokenOrigin};
