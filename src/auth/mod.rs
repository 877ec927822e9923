//! Sign-in token support

pub mod jwt;

pub use jwt::{Claims, TokenSettings};
