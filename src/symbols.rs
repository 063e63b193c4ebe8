//! SQL:1999 punctuation and operator symbols.

use std::fmt;

/// A special symbol recognized by the lexer.
///
/// Multi-character symbols must be tried before their single-character
/// prefixes, so [`Symbol::ALL`] is ordered by decreasing text length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Concatenation,
    DoubleColon,
    GreaterThanOrEquals,
    LessThanOrEquals,
    NotEquals,
    RightArrow,
    Ampersand,
    Asterisk,
    Circumflex,
    Colon,
    Comma,
    DoubleQuote,
    Equals,
    GreaterThan,
    LeftBrace,
    LeftBracket,
    LeftParen,
    LessThan,
    Minus,
    Percent,
    Period,
    Plus,
    QuestionMark,
    Quote,
    RightBrace,
    RightBracket,
    RightParen,
    Semicolon,
    Solidus,
    Underscore,
    VerticalBar,
}

impl Symbol {
    /// Every symbol, two-character operators first.
    pub const ALL: &'static [Symbol] = &[
        Symbol::Concatenation,
        Symbol::DoubleColon,
        Symbol::GreaterThanOrEquals,
        Symbol::LessThanOrEquals,
        Symbol::NotEquals,
        Symbol::RightArrow,
        Symbol::Ampersand,
        Symbol::Asterisk,
        Symbol::Circumflex,
        Symbol::Colon,
        Symbol::Comma,
        Symbol::DoubleQuote,
        Symbol::Equals,
        Symbol::GreaterThan,
        Symbol::LeftBrace,
        Symbol::LeftBracket,
        Symbol::LeftParen,
        Symbol::LessThan,
        Symbol::Minus,
        Symbol::Percent,
        Symbol::Period,
        Symbol::Plus,
        Symbol::QuestionMark,
        Symbol::Quote,
        Symbol::RightBrace,
        Symbol::RightBracket,
        Symbol::RightParen,
        Symbol::Semicolon,
        Symbol::Solidus,
        Symbol::Underscore,
        Symbol::VerticalBar,
    ];

    pub fn text(self) -> &'static str {
        match self {
            Symbol::Concatenation => "||",
            Symbol::DoubleColon => "::",
            Symbol::GreaterThanOrEquals => ">=",
            Symbol::LessThanOrEquals => "<=",
            Symbol::NotEquals => "<>",
            Symbol::RightArrow => "->",
            Symbol::Ampersand => "&",
            Symbol::Asterisk => "*",
            Symbol::Circumflex => "^",
            Symbol::Colon => ":",
            Symbol::Comma => ",",
            Symbol::DoubleQuote => "\"",
            Symbol::Equals => "=",
            Symbol::GreaterThan => ">",
            Symbol::LeftBrace => "{",
            Symbol::LeftBracket => "[",
            Symbol::LeftParen => "(",
            Symbol::LessThan => "<",
            Symbol::Minus => "-",
            Symbol::Percent => "%",
            Symbol::Period => ".",
            Symbol::Plus => "+",
            Symbol::QuestionMark => "?",
            Symbol::Quote => "'",
            Symbol::RightBrace => "}",
            Symbol::RightBracket => "]",
            Symbol::RightParen => ")",
            Symbol::Semicolon => ";",
            Symbol::Solidus => "/",
            Symbol::Underscore => "_",
            Symbol::VerticalBar => "|",
        }
    }

    /// Longest symbol matching a prefix of `input`.
    pub fn match_prefix(input: &str) -> Option<Symbol> {
        Symbol::ALL
            .iter()
            .copied()
            .find(|sym| input.starts_with(sym.text()))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(">=", Symbol::GreaterThanOrEquals)]
    #[case(">", Symbol::GreaterThan)]
    #[case("<>", Symbol::NotEquals)]
    #[case("<=", Symbol::LessThanOrEquals)]
    #[case("<", Symbol::LessThan)]
    #[case("||", Symbol::Concatenation)]
    #[case("|", Symbol::VerticalBar)]
    #[case("::", Symbol::DoubleColon)]
    #[case(";", Symbol::Semicolon)]
    fn longest_symbol_wins(#[case] input: &str, #[case] expected: Symbol) {
        assert_eq!(Symbol::match_prefix(input), Some(expected));
    }

    #[rstest]
    fn multi_char_symbols_sorted_first() {
        let first_single = Symbol::ALL
            .iter()
            .position(|s| s.text().len() == 1)
            .unwrap();
        assert!(
            Symbol::ALL[..first_single]
                .iter()
                .all(|s| s.text().len() == 2)
        );
        assert!(
            Symbol::ALL[first_single..]
                .iter()
                .all(|s| s.text().len() == 1)
        );
    }

    #[rstest]
    fn no_match_on_alphanumeric() {
        assert_eq!(Symbol::match_prefix("abc"), None);
        assert_eq!(Symbol::match_prefix("1 + 2"), None);
    }
}
