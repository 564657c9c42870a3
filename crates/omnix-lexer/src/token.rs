//! Token types for the OMNIX lexer.
//!
//! Defines [`TokenKind`] covering every OMNIX lexeme and [`Token`], which
//! pairs a kind with a source [`Span`]. Identifier-shaped lexemes are
//! classified in order: keyword set → type set → consensus-algorithm set →
//! blockchain-network set → plain identifier.

use omnix_types::ast::TimeUnit;
use omnix_types::Span;
use std::fmt;

/// All 26 reserved keywords.
///
/// These can never be used as user-defined names; the lexer emits a
/// dedicated keyword token instead of [`TokenKind::Identifier`].
pub const KEYWORDS: &[&str] = &[
    "consensus", "cluster", "node", "function", "service", "state", "when", "phase",
    "broadcast", "on", "let", "return", "if", "else", "for", "while", "loop",
    "contract", "pipeline", "stage", "import", "export", "in", "true", "false", "null",
];

/// Reserved primitive/container type names.
pub const TYPE_NAMES: &[&str] = &[
    "bool", "u32", "u64", "i32", "i64", "f32", "f64", "string", "vec", "set", "map",
];

/// Recognized consensus-algorithm names.
pub const ALGORITHMS: &[&str] = &["Raft", "PBFT", "Tendermint", "HotStuff"];

/// Recognized blockchain-network names.
pub const NETWORKS: &[&str] = &["ethereum", "polygon", "solana", "avalanche", "cosmos"];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the OMNIX lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Source location.
    pub span: Span,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// 1-based line the token starts on.
    pub fn line(&self) -> u32 {
        self.span.start_line
    }

    /// Returns `true` if this token is a reserved keyword.
    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

/// Every token kind in the OMNIX language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────

    /// Integer literal: `42`
    Int(i64),
    /// Float literal: `3.14`
    Float(f64),
    /// String literal: `"hello"` or `'hello'`
    Str(String),
    /// Time literal with unit suffix: `3000ms`, `5s`, `2days`
    Duration { value: i64, unit: TimeUnit },

    // ── Identifier-shaped ────────────────────────────────────

    /// User-defined identifier: `counter`, `self`
    Identifier(String),
    /// Reserved type name: `u64`, `vec`, `map`
    TypeName(String),
    /// Consensus-algorithm name: `Raft`, or fused `Consensus::PBFT`
    Algorithm(String),
    /// Blockchain-network name: `ethereum`, `polygon`
    Network(String),

    // ── Keywords ─────────────────────────────────────────────

    /// `consensus`
    Consensus,
    /// `cluster`
    Cluster,
    /// `node`
    Node,
    /// `function`
    Function,
    /// `service`
    Service,
    /// `state`
    State,
    /// `when`
    When,
    /// `phase`
    Phase,
    /// `broadcast`
    Broadcast,
    /// `on`
    On,
    /// `let`
    Let,
    /// `return`
    Return,
    /// `if`
    If,
    /// `else`
    Else,
    /// `for`
    For,
    /// `while`
    While,
    /// `loop` (reserved, no statement form yet)
    Loop,
    /// `contract`
    Contract,
    /// `pipeline`
    Pipeline,
    /// `stage`
    Stage,
    /// `import`
    Import,
    /// `export`
    Export,
    /// `in`
    In,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,

    // ── Consensus operators ──────────────────────────────────

    /// `<!>` propose
    Propose,
    /// `<?>` vote
    Vote,
    /// `<#>` merge
    Merge,
    /// `<@>` query
    Query,

    // ── Operators ────────────────────────────────────────────

    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<=`
    LessEq,
    /// `>=`
    GreaterEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `->`
    Arrow,
    /// `::`
    ColonColon,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `=`
    Assign,
    /// `!`
    Bang,

    // ── Punctuation ──────────────────────────────────────────

    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `@`
    At,

    // ── Special ──────────────────────────────────────────────

    /// End of file
    Eof,
}

impl TokenKind {
    /// Classify an identifier-shaped lexeme.
    ///
    /// Order matters: keywords shadow type names, which shadow algorithm
    /// names, which shadow network names.
    pub fn classify_word(word: &str) -> TokenKind {
        if let Some(kind) = TokenKind::from_keyword(word) {
            return kind;
        }
        if TYPE_NAMES.contains(&word) {
            return TokenKind::TypeName(word.to_string());
        }
        if ALGORITHMS.contains(&word) {
            return TokenKind::Algorithm(word.to_string());
        }
        if NETWORKS.contains(&word) {
            return TokenKind::Network(word.to_string());
        }
        TokenKind::Identifier(word.to_string())
    }

    /// Look up a reserved keyword. Returns `None` for anything else.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "consensus" => TokenKind::Consensus,
            "cluster" => TokenKind::Cluster,
            "node" => TokenKind::Node,
            "function" => TokenKind::Function,
            "service" => TokenKind::Service,
            "state" => TokenKind::State,
            "when" => TokenKind::When,
            "phase" => TokenKind::Phase,
            "broadcast" => TokenKind::Broadcast,
            "on" => TokenKind::On,
            "let" => TokenKind::Let,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "loop" => TokenKind::Loop,
            "contract" => TokenKind::Contract,
            "pipeline" => TokenKind::Pipeline,
            "stage" => TokenKind::Stage,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "in" => TokenKind::In,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        })
    }

    /// Returns `true` if this token kind is a reserved keyword.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Consensus
                | TokenKind::Cluster
                | TokenKind::Node
                | TokenKind::Function
                | TokenKind::Service
                | TokenKind::State
                | TokenKind::When
                | TokenKind::Phase
                | TokenKind::Broadcast
                | TokenKind::On
                | TokenKind::Let
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Loop
                | TokenKind::Contract
                | TokenKind::Pipeline
                | TokenKind::Stage
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::In
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// Returns `true` for the four consensus operators.
    pub fn is_consensus_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Propose | TokenKind::Vote | TokenKind::Merge | TokenKind::Query
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "{n}"),
            TokenKind::Float(n) => write!(f, "{n}"),
            TokenKind::Str(s) => write!(f, "\"{s}\""),
            TokenKind::Duration { value, unit } => write!(f, "{value}{}", unit.suffix()),
            TokenKind::Identifier(s) => f.write_str(s),
            TokenKind::TypeName(s) => f.write_str(s),
            TokenKind::Algorithm(s) => f.write_str(s),
            TokenKind::Network(s) => f.write_str(s),
            TokenKind::Consensus => f.write_str("consensus"),
            TokenKind::Cluster => f.write_str("cluster"),
            TokenKind::Node => f.write_str("node"),
            TokenKind::Function => f.write_str("function"),
            TokenKind::Service => f.write_str("service"),
            TokenKind::State => f.write_str("state"),
            TokenKind::When => f.write_str("when"),
            TokenKind::Phase => f.write_str("phase"),
            TokenKind::Broadcast => f.write_str("broadcast"),
            TokenKind::On => f.write_str("on"),
            TokenKind::Let => f.write_str("let"),
            TokenKind::Return => f.write_str("return"),
            TokenKind::If => f.write_str("if"),
            TokenKind::Else => f.write_str("else"),
            TokenKind::For => f.write_str("for"),
            TokenKind::While => f.write_str("while"),
            TokenKind::Loop => f.write_str("loop"),
            TokenKind::Contract => f.write_str("contract"),
            TokenKind::Pipeline => f.write_str("pipeline"),
            TokenKind::Stage => f.write_str("stage"),
            TokenKind::Import => f.write_str("import"),
            TokenKind::Export => f.write_str("export"),
            TokenKind::In => f.write_str("in"),
            TokenKind::True => f.write_str("true"),
            TokenKind::False => f.write_str("false"),
            TokenKind::Null => f.write_str("null"),
            TokenKind::Propose => f.write_str("<!>"),
            TokenKind::Vote => f.write_str("<?>"),
            TokenKind::Merge => f.write_str("<#>"),
            TokenKind::Query => f.write_str("<@>"),
            TokenKind::EqEq => f.write_str("=="),
            TokenKind::NotEq => f.write_str("!="),
            TokenKind::LessEq => f.write_str("<="),
            TokenKind::GreaterEq => f.write_str(">="),
            TokenKind::AndAnd => f.write_str("&&"),
            TokenKind::OrOr => f.write_str("||"),
            TokenKind::Arrow => f.write_str("->"),
            TokenKind::ColonColon => f.write_str("::"),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::Less => f.write_str("<"),
            TokenKind::Greater => f.write_str(">"),
            TokenKind::Assign => f.write_str("="),
            TokenKind::Bang => f.write_str("!"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Semicolon => f.write_str(";"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::At => f.write_str("@"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_count() {
        assert_eq!(KEYWORDS.len(), 26);
    }

    #[test]
    fn test_from_keyword_recognises_all() {
        for &kw in KEYWORDS {
            assert!(
                TokenKind::from_keyword(kw).is_some(),
                "from_keyword should recognise '{kw}'"
            );
        }
    }

    #[test]
    fn test_is_keyword_true_for_all() {
        for &kw in KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap();
            assert!(kind.is_keyword(), "is_keyword should be true for '{kw}'");
        }
    }

    #[test]
    fn test_classification_order() {
        // keyword beats everything
        assert_eq!(TokenKind::classify_word("cluster"), TokenKind::Cluster);
        // type name
        assert_eq!(
            TokenKind::classify_word("u64"),
            TokenKind::TypeName("u64".into())
        );
        // algorithm name
        assert_eq!(
            TokenKind::classify_word("Raft"),
            TokenKind::Algorithm("Raft".into())
        );
        // network name
        assert_eq!(
            TokenKind::classify_word("ethereum"),
            TokenKind::Network("ethereum".into())
        );
        // plain identifier
        assert_eq!(
            TokenKind::classify_word("counter"),
            TokenKind::Identifier("counter".into())
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            TokenKind::classify_word("Cluster"),
            TokenKind::Identifier("Cluster".into())
        );
        assert_eq!(
            TokenKind::classify_word("raft"),
            TokenKind::Identifier("raft".into())
        );
    }

    #[test]
    fn test_display_roundtrip_keywords() {
        for &kw in KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap();
            assert_eq!(kind.to_string(), kw);
        }
    }

    #[test]
    fn test_display_operators() {
        assert_eq!(TokenKind::Propose.to_string(), "<!>");
        assert_eq!(TokenKind::Vote.to_string(), "<?>");
        assert_eq!(TokenKind::Merge.to_string(), "<#>");
        assert_eq!(TokenKind::Query.to_string(), "<@>");
        assert_eq!(TokenKind::EqEq.to_string(), "==");
        assert_eq!(TokenKind::Arrow.to_string(), "->");
        assert_eq!(TokenKind::ColonColon.to_string(), "::");
    }

    #[test]
    fn test_is_consensus_op() {
        assert!(TokenKind::Propose.is_consensus_op());
        assert!(TokenKind::Merge.is_consensus_op());
        assert!(!TokenKind::Less.is_consensus_op());
        assert!(!TokenKind::At.is_consensus_op());
    }

    #[test]
    fn test_duration_display() {
        use omnix_types::ast::TimeUnit;
        let kind = TokenKind::Duration {
            value: 5,
            unit: TimeUnit::Seconds,
        };
        assert_eq!(kind.to_string(), "5s");
    }
}
