//! Session tokens for team-scoped access.
//!
//! A session token is an RS256 JWT asserting a team name, team id and admin
//! flag until its `exp`. Tokens are minted once an OAuth2 login has been
//! verified and travel back either in the `ATC-Authorization` cookie or in an
//! `Authorization: Bearer` header.

mod cookie;
mod token;

pub use cookie::{
    SESSION_COOKIE_NAME, STATE_COOKIE_NAME, bearer_token, bearer_value, http_date, read_cookie,
    set_cookie,
};
pub use token::{SessionClaims, TokenCodec, TokenError, VerifiedSession};
