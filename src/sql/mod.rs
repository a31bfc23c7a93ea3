//! SQL generation module.
//!
//! A small, type-safe SQL builder:
//!
//! - [`token`] - token types and the token stream all SQL text flows through
//! - [`value`] - positionally bound values
//!
//! There is deliberately no raw-string escape hatch here: identifiers enter
//! the stream as [`token::Token::Ident`]/[`token::Token::QualifiedIdent`]
//! (and must be whitelist-validated first), values only ever as
//! [`token::Token::Placeholder`].

pub mod token;
pub mod value;

pub use token::{quote_ident, Token, TokenStream};
pub use value::SqlValue;
