//! Platform API clients: highlight listing, playback tokens, user lookup

pub mod client;
pub mod gql;
pub mod helix;
pub mod user;

pub use client::*;
pub use gql::*;
pub use helix::*;
pub use user::*;
