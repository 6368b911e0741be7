//! Backchannel logout.
//!
//! The identity provider notifies this system out-of-band when a user's
//! session elsewhere has ended. The notification is a signed JWT logout
//! token, verified by [`LogoutTokenVerifier`]; a successful verification
//! records a forced-logout flag per identity via [`LogoutNotice`], which
//! every subsequent request bearing a session for that identity must
//! honor by forcing re-authentication.

mod notice;
mod token;

pub use notice::LogoutNotice;
pub use token::{BACKCHANNEL_LOGOUT_EVENT, LogoutClaims, LogoutTokenError, LogoutTokenVerifier};
