//! TLA+ lexer using logos
//!
//! Token categories:
//! 1. Module delimiters: `----` headers, `====` footers
//! 2. Keywords: MODULE, EXTENDS, VARIABLE, CONSTANT, LET, CHOOSE, ...
//! 3. Operators: ==, =>, /\, \/, \in, |->, :>, @@, ...
//! 4. Literals: numbers, strings
//! 5. Identifiers (including number-prefixed names like 1aMessage)
//! 6. Comments: \* line comments, (* block comments *) with nesting

use logos::Logos;

/// Callback to lex block comments (* ... *)
///
/// Handles nesting: `(* a (* b *) c *)` is one comment token.
fn lex_block_comment(lexer: &mut logos::Lexer<Token>) -> bool {
    let remainder = lexer.remainder();
    let mut depth = 1; // Already saw opening (*
    let mut i = 0;
    let bytes = remainder.as_bytes();

    while i < bytes.len() && depth > 0 {
        if i + 1 < bytes.len() {
            if bytes[i] == b'*' && bytes[i + 1] == b')' {
                depth -= 1;
                if depth == 0 {
                    lexer.bump(i + 2); // Include the closing *)
                    return true;
                }
                i += 2;
                continue;
            }
            if bytes[i] == b'(' && bytes[i + 1] == b'*' {
                depth += 1;
                i += 2;
                continue;
            }
        }
        i += 1;
    }

    // Unclosed comment
    false
}

/// Tokens of the supported TLA+ subset
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    // === Trivia ===
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r"\\\*[^\n]*")]
    LineComment,

    #[token("(*", lex_block_comment)]
    BlockComment,

    // === Module structure ===
    // TLA+ allows variable-length header/footer lines
    #[regex(r"-{4,}")]
    ModuleStart,

    #[regex(r"={4,}")]
    ModuleEnd,

    #[token("MODULE")]
    Module,

    #[token("EXTENDS")]
    Extends,

    // === Declarations ===
    #[token("VARIABLE")]
    #[token("VARIABLES")]
    Variable,

    #[token("CONSTANT")]
    #[token("CONSTANTS")]
    Constant,

    // === Logic keywords ===
    #[token("TRUE")]
    True,

    #[token("FALSE")]
    False,

    #[token("BOOLEAN")]
    Boolean,

    #[token("IF")]
    If,

    #[token("THEN")]
    Then,

    #[token("ELSE")]
    Else,

    #[token("CASE")]
    Case,

    #[token("OTHER")]
    Other,

    #[token("LET")]
    Let,

    #[token("IN")]
    In,

    #[token("CHOOSE")]
    Choose,

    // === Quantifiers ===
    #[token("\\A")]
    #[token("\\forall")]
    Forall,

    #[token("\\E")]
    #[token("\\exists")]
    Exists,

    // === Set operators ===
    #[token("\\in")]
    In_,

    #[token("\\notin")]
    NotIn,

    #[token("\\cup")]
    #[token("\\union")]
    Union,

    #[token("\\cap")]
    #[token("\\intersect")]
    Intersect,

    #[token("\\")]
    #[token("\\setminus")]
    SetMinus,

    #[token("\\X")]
    #[token("\\times")]
    Times,

    #[token("SUBSET")]
    Powerset,

    // === Action keywords ===
    #[token("ENABLED")]
    Enabled,

    #[token("UNCHANGED")]
    Unchanged,

    // === Logical operators ===
    #[token("/\\")]
    #[token("\\land")]
    And,

    #[token("\\/")]
    #[token("\\lor")]
    Or,

    #[token("~")]
    #[token("\\lnot")]
    #[token("\\neg")]
    Not,

    #[token("=>")]
    Implies,

    // === Comparison ===
    #[token("=")]
    Eq,

    #[token("#")]
    #[token("/=")]
    Neq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("<=")]
    #[token("=<")]
    #[token("\\leq")]
    Leq,

    #[token(">=")]
    #[token("\\geq")]
    Geq,

    // === Arithmetic ===
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("%")]
    Percent,

    #[token("..")]
    DotDot,

    // === Definition ===
    #[token("==")]
    DefEq,

    #[token("'")]
    Prime,

    // === Functions ===
    #[token("DOMAIN")]
    Domain,

    #[token("EXCEPT")]
    Except,

    #[token("\\o")]
    #[token("\\circ")]
    Concat,

    // === Delimiters ===
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("<<")]
    LAngle,

    #[token(">>")]
    RAngle,

    // CASE arm separator (no temporal operators in this subset)
    #[token("[]")]
    CaseSep,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("@")]
    At,

    #[token("!")]
    Bang,

    #[token("|->")]
    MapsTo,

    #[token("->")]
    Arrow,

    #[token(":>")]
    ColonGt,

    #[token("@@")]
    AtAt,

    // === Literals ===
    #[regex(r"[0-9]+")]
    Number,

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    // === Identifiers ===
    // TLA+ identifiers start with a letter, followed by letters, digits,
    // or underscores. Number-prefixed operator names like 1aMessage
    // (common in consensus specs) are identifiers too.
    #[regex(r"[0-9]+[a-zA-Z][a-zA-Z0-9_]*")]
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl Token {
    /// Returns true if this token is trivia (whitespace/comments)
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace | Token::LineComment | Token::BlockComment
        )
    }

    /// Returns true if this token is a comment
    pub fn is_comment(&self) -> bool {
        matches!(self, Token::LineComment | Token::BlockComment)
    }
}

/// Lex source code into (token, span) pairs, including trivia.
/// Unlexable input surfaces as `Err` items carrying the bad span.
pub fn lex_spanned(source: &str) -> Vec<(Result<Token, ()>, std::ops::Range<usize>)> {
    Token::lexer(source).spanned().collect()
}

/// Lex source code into non-trivia tokens with their text (for tests)
pub fn lex(source: &str) -> impl Iterator<Item = (Token, &str)> {
    Token::lexer(source)
        .spanned()
        .filter_map(|(result, span)| result.ok().map(|token| (token, &source[span])))
        .filter(|(token, _)| !token.is_trivia())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let tokens: Vec<_> = lex("MODULE Counter").collect();
        assert_eq!(
            tokens,
            vec![(Token::Module, "MODULE"), (Token::Ident, "Counter")]
        );
    }

    #[test]
    fn test_definition() {
        let tokens: Vec<_> = lex("Init == x = 0").collect();
        assert_eq!(
            tokens,
            vec![
                (Token::Ident, "Init"),
                (Token::DefEq, "=="),
                (Token::Ident, "x"),
                (Token::Eq, "="),
                (Token::Number, "0"),
            ]
        );
    }

    #[test]
    fn test_quantifier() {
        let tokens: Vec<_> = lex("\\E i \\in 1..N : P(i)").collect();
        assert_eq!(tokens[0], (Token::Exists, "\\E"));
        assert_eq!(tokens[2], (Token::In_, "\\in"));
        assert_eq!(tokens[4], (Token::DotDot, ".."));
        assert_eq!(tokens[6], (Token::Colon, ":"));
    }

    #[test]
    fn test_setminus_vs_named_set_ops() {
        let tokens: Vec<_> = lex("A \\ B \\cup C").collect();
        assert_eq!(tokens[1], (Token::SetMinus, "\\"));
        assert_eq!(tokens[3], (Token::Union, "\\cup"));
    }

    #[test]
    fn test_prime_and_except() {
        let tokens: Vec<_> = lex("f' = [f EXCEPT ![i] = 1]").collect();
        assert_eq!(tokens[1], (Token::Prime, "'"));
        assert_eq!(tokens[5], (Token::Except, "EXCEPT"));
        assert_eq!(tokens[6], (Token::Bang, "!"));
    }

    #[test]
    fn test_case_separator_is_not_brackets() {
        let tokens: Vec<_> = lex("CASE a -> b [] OTHER -> c").collect();
        assert_eq!(tokens[4], (Token::CaseSep, "[]"));
    }

    #[test]
    fn test_fcn_merge_operators() {
        let tokens: Vec<_> = lex("1 :> \"a\" @@ 2 :> \"b\"").collect();
        assert_eq!(tokens[1], (Token::ColonGt, ":>"));
        assert_eq!(tokens[3], (Token::AtAt, "@@"));
    }

    #[test]
    fn test_line_comment() {
        let source = "x \\* trailing note\ny";
        let tokens: Vec<_> = Token::lexer(source)
            .spanned()
            .filter_map(|(r, s)| r.ok().map(|t| (t, &source[s])))
            .filter(|(t, _)| *t != Token::Whitespace)
            .collect();
        assert_eq!(tokens[1].0, Token::LineComment);
        assert_eq!(tokens[1].1, "\\* trailing note");
    }

    #[test]
    fn test_nested_block_comment() {
        let source = "(* outer (* inner *) still outer *) x";
        let tokens: Vec<_> = Token::lexer(source)
            .spanned()
            .filter_map(|(r, s)| r.ok().map(|t| (t, &source[s])))
            .filter(|(t, _)| *t != Token::Whitespace)
            .collect();
        assert_eq!(tokens[0].0, Token::BlockComment);
        assert_eq!(tokens[1], (Token::Ident, "x"));
    }

    #[test]
    fn test_decorative_comments() {
        for pattern in ["(* x *)", "(***)", "(****)", "(********************)"] {
            let tokens: Vec<_> = Token::lexer(pattern)
                .spanned()
                .filter_map(|(r, _)| r.ok())
                .collect();
            assert_eq!(tokens, vec![Token::BlockComment], "pattern {:?}", pattern);
        }
    }

    #[test]
    fn test_module_delimiters() {
        let tokens: Vec<_> = lex("---- MODULE M ----\n====").collect();
        assert_eq!(tokens[0].0, Token::ModuleStart);
        assert_eq!(tokens[3].0, Token::ModuleStart);
        assert_eq!(tokens[4].0, Token::ModuleEnd);
    }

    #[test]
    fn test_number_prefixed_identifiers() {
        let tokens: Vec<_> = lex("1aMessage 2avMessage").collect();
        assert_eq!(tokens[0], (Token::Ident, "1aMessage"));
        assert_eq!(tokens[1], (Token::Ident, "2avMessage"));
    }

    #[test]
    fn test_angle_brackets() {
        let tokens: Vec<_> = lex("<<1, 2>>").collect();
        assert_eq!(tokens[0].0, Token::LAngle);
        assert_eq!(tokens[4].0, Token::RAngle);
    }
}
