//! SQL tokens - the atomic units of SQL output.
//!
//! Every piece of SQL text this crate emits is assembled from these tokens.
//! Identifiers are quoted on serialization; values never appear as tokens at
//! all - the only value-shaped token is [`Token::Placeholder`], which
//! serializes to `?` and is bound positionally by the executor.

/// SQL token - every element this engine can emit.
///
/// Adding a new variant causes compile errors everywhere it needs to be
/// handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    On,
    Join,
    Left,
    Distinct,
    In,
    Between,

    // === Punctuation ===
    Comma,
    LParen,
    RParen,

    // === Operators ===
    Eq,

    // === Whitespace ===
    Space,

    // === Dynamic content ===
    /// Simple identifier (table, column, alias). Quoted on serialization.
    Ident(String),
    /// Table-qualified column: `"table"."column"`.
    QualifiedIdent { table: String, column: String },
    /// Function name - rendered as-is, uppercase by convention.
    FunctionName(String),
    /// Positional bind marker. Serializes to `?`; the matching value is
    /// carried separately and never enters the SQL text.
    Placeholder,
}

impl Token {
    /// Serialize this token to a string.
    pub fn serialize(&self) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Left => "LEFT".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::In => "IN".into(),
            Token::Between => "BETWEEN".into(),

            Token::Comma => ",".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),

            Token::Space => " ".into(),

            Token::Ident(name) => quote_ident(name),
            Token::QualifiedIdent { table, column } => {
                format!("{}.{}", quote_ident(table), quote_ident(column))
            }
            Token::FunctionName(name) => name.to_uppercase(),
            Token::Placeholder => "?".into(),
        }
    }
}

/// Quote an identifier with double quotes (ANSI style), doubling any
/// embedded quote.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A stream of tokens that serializes to SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self) -> String {
        self.tokens.iter().map(Token::serialize).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    pub fn placeholder(&mut self) -> &mut Self {
        self.push(Token::Placeholder)
    }

    /// Push a comma-separated run of placeholders, one per bound value.
    pub fn placeholder_list(&mut self, count: usize) -> &mut Self {
        for i in 0..count {
            if i > 0 {
                self.comma().space();
            }
            self.placeholder();
        }
        self
    }
}
