//! QSS/CSS layer parsing.
//!
//! Built on `cssparser` (the tokenizer used by Firefox), which handles
//! comments, escapes, strings and nested blocks. Selectors and values are
//! kept verbatim rather than interpreted: a layer file is a list of
//! `selector → {property: value}` entries and the rendering surface owns
//! their meaning.
//!
//! # Supported syntax
//!
//! ```css
//! /* Plain rules; selector lists fan out into one rule per selector */
//! QPushButton, QToolButton {
//!     border: 1px solid #c8c8c8;
//!     border-radius: 4px;
//! }
//!
//! /* Rules that only apply in dark mode */
//! @media (prefers-color-scheme: dark) {
//!     QPushButton { background: #3c3f41; }
//! }
//!
//! /* Rules gated on an arbitrary named context */
//! @context compact {
//!     QPushButton { padding: 2px; }
//! }
//! ```
//!
//! Conditional blocks may nest; the inner rules require every enclosing
//! context. The first syntax error aborts the whole layer.

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError as CssParseError,
    ParseErrorKind, Parser, ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser,
    RuleBodyParser, SourcePosition, StyleSheetParser, ToCss, Token,
};
use thiserror::Error;

use super::rule::{Condition, Declarations, StyleRule};
use crate::error::ParseError;

/// Parses QSS/CSS text into a flat rule list.
pub(crate) fn parse_qss(layer: &str, css: &str) -> Result<Vec<StyleRule>, ParseError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);

    let mut collector = RuleCollector {
        rules: Vec::new(),
        condition: None,
    };

    let mut failure = None;
    for result in StyleSheetParser::new(&mut parser, &mut collector) {
        if let Err((err, _)) = result {
            failure = Some(to_parse_error(layer, err));
            break;
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(collector.rules),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum RuleError {
    #[error("empty selector")]
    EmptySelector,
    #[error("unexpected ';' in selector, rule is missing its property block")]
    MissingBlock,
    #[error("empty value for property '{0}'")]
    EmptyValue(String),
    #[error("unsupported at-rule '@{0}'")]
    UnsupportedAtRule(String),
    #[error("unsupported media query, expected (prefers-color-scheme: light|dark)")]
    UnsupportedMediaQuery,
}

fn to_parse_error(layer: &str, err: CssParseError<'_, RuleError>) -> ParseError {
    let line = err.location.line as usize + 1;
    let message = match err.kind {
        ParseErrorKind::Custom(rule_error) => rule_error.to_string(),
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
            format!("unexpected '{}'", token.to_css_string())
        }
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            "unexpected end of input, rule is missing its property block".to_string()
        }
        ParseErrorKind::Basic(BasicParseErrorKind::AtRuleInvalid(name)) => {
            format!("invalid at-rule '@{}'", name.as_ref())
        }
        ParseErrorKind::Basic(other) => format!("{:?}", other),
    };
    ParseError::new(layer, Some(line), message)
}

struct RuleCollector {
    rules: Vec<StyleRule>,
    /// Condition of the enclosing conditional block, if any.
    condition: Option<Condition>,
}

impl<'i> QualifiedRuleParser<'i> for RuleCollector {
    type Prelude = Vec<String>;
    type QualifiedRule = ();
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, CssParseError<'i, Self::Error>> {
        let mut selectors = Vec::new();
        let mut text = TokenText::default();

        loop {
            let start = input.position();
            let closing = match input.next_including_whitespace_and_comments() {
                Ok(Token::Comma) => {
                    let selector = std::mem::take(&mut text).finish();
                    if selector.is_empty() {
                        return Err(input.new_custom_error(RuleError::EmptySelector));
                    }
                    selectors.push(selector);
                    continue;
                }
                Ok(Token::Semicolon) => {
                    return Err(input.new_custom_error(RuleError::MissingBlock));
                }
                Ok(Token::WhiteSpace(_)) | Ok(Token::Comment(_)) => {
                    text.space();
                    continue;
                }
                Ok(token) => closing_delimiter(token),
                Err(_) => break,
            };
            text.push_token(input, start, closing)?;
        }

        let selector = text.finish();
        if selector.is_empty() {
            return Err(input.new_custom_error(RuleError::EmptySelector));
        }
        selectors.push(selector);
        Ok(selectors)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, CssParseError<'i, Self::Error>> {
        let line = start.source_location().line as usize + 1;

        let mut decl_parser = PropertyParser;
        let mut declarations = Declarations::new();
        for item in RuleBodyParser::new(input, &mut decl_parser) {
            match item {
                Ok((property, value)) => {
                    declarations.set(property, value);
                }
                Err((err, _)) => return Err(err),
            }
        }

        for selector in prelude {
            self.rules.push(StyleRule {
                selector,
                declarations: declarations.clone(),
                condition: self.condition.clone(),
                line: Some(line),
            });
        }
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for RuleCollector {
    type Prelude = Condition;
    type AtRule = ();
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, CssParseError<'i, Self::Error>> {
        match name.as_ref().to_ascii_lowercase().as_str() {
            "media" => parse_media_condition(input),
            "context" => {
                let context = input.expect_ident()?.as_ref().to_string();
                input.expect_exhausted()?;
                Ok(Condition::when(context))
            }
            other => Err(input.new_custom_error(RuleError::UnsupportedAtRule(other.to_string()))),
        }
    }

    fn parse_block<'t>(
        &mut self,
        condition: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, CssParseError<'i, Self::Error>> {
        let outer = self.condition.clone();
        self.condition = Some(match &outer {
            Some(enclosing) => enclosing.clone().and(&condition),
            None => condition,
        });

        let mut failure = None;
        for result in StyleSheetParser::new(input, self) {
            if let Err((err, _)) = result {
                failure = Some(err);
                break;
            }
        }

        self.condition = outer;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Parses `(prefers-color-scheme: light|dark)`.
fn parse_media_condition<'i, 't>(
    input: &mut Parser<'i, 't>,
) -> Result<Condition, CssParseError<'i, RuleError>> {
    input.expect_parenthesis_block()?;
    let scheme = input.parse_nested_block(|input| -> Result<String, CssParseError<'i, RuleError>> {
        input.expect_ident_matching("prefers-color-scheme")?;
        input.expect_colon()?;
        let scheme = input.expect_ident()?.as_ref().to_ascii_lowercase();
        input.expect_exhausted()?;
        Ok(scheme)
    })?;
    input.expect_exhausted()?;

    match scheme.as_str() {
        "dark" => Ok(Condition::dark()),
        "light" => Ok(Condition::light()),
        _ => Err(input.new_custom_error(RuleError::UnsupportedMediaQuery)),
    }
}

/// Parses `property: value` declarations, keeping values verbatim.
struct PropertyParser;

impl<'i> DeclarationParser<'i> for PropertyParser {
    type Declaration = (String, String);
    type Error = RuleError;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, CssParseError<'i, Self::Error>> {
        let property = name.as_ref().to_ascii_lowercase();
        let mut text = TokenText::default();
        read_tokens(input, &mut text)?;

        let value = text.finish();
        if value.is_empty() {
            return Err(input.new_custom_error(RuleError::EmptyValue(property)));
        }
        Ok((property, value))
    }
}

impl<'i> AtRuleParser<'i> for PropertyParser {
    type Prelude = ();
    type AtRule = (String, String);
    type Error = RuleError;
}

impl<'i> QualifiedRuleParser<'i> for PropertyParser {
    type Prelude = ();
    type QualifiedRule = (String, String);
    type Error = RuleError;
}

impl<'i> RuleBodyItemParser<'i, (String, String), RuleError> for PropertyParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Source text rebuilt token by token: comments are dropped, whitespace
/// runs collapse to one space, and quoted strings are copied as written.
#[derive(Default)]
struct TokenText {
    out: String,
    pending_space: bool,
}

impl TokenText {
    fn space(&mut self) {
        self.pending_space = !self.out.is_empty() && !self.out.ends_with(['(', '[', '{']);
    }

    fn push(&mut self, text: &str) {
        if self.pending_space {
            self.out.push(' ');
            self.pending_space = false;
        }
        self.out.push_str(text);
    }

    /// Appends the token that started at `start`, recursing into its block.
    fn push_token<'i, 't>(
        &mut self,
        input: &mut Parser<'i, 't>,
        start: SourcePosition,
        closing: Option<&'static str>,
    ) -> Result<(), CssParseError<'i, RuleError>> {
        self.push(input.slice_from(start));
        if let Some(closing) = closing {
            input.parse_nested_block(|nested| -> Result<(), CssParseError<'i, RuleError>> {
                read_tokens(nested, self)
            })?;
            self.pending_space = false;
            self.out.push_str(closing);
        }
        Ok(())
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Copies every remaining token of `input` into `text`.
fn read_tokens<'i, 't>(
    input: &mut Parser<'i, 't>,
    text: &mut TokenText,
) -> Result<(), CssParseError<'i, RuleError>> {
    loop {
        let start = input.position();
        let closing = match input.next_including_whitespace_and_comments() {
            Ok(Token::WhiteSpace(_)) | Ok(Token::Comment(_)) => {
                text.space();
                continue;
            }
            Ok(token) => closing_delimiter(token),
            Err(_) => return Ok(()),
        };
        text.push_token(input, start, closing)?;
    }
}

fn closing_delimiter(token: &Token<'_>) -> Option<&'static str> {
    match token {
        Token::Function(_) | Token::ParenthesisBlock => Some(")"),
        Token::SquareBracketBlock => Some("]"),
        Token::CurlyBracketBlock => Some("}"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StyleContext;

    fn parse(css: &str) -> Vec<StyleRule> {
        parse_qss("test", css).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let rules = parse("QPushButton { background: white; color: #202020; }");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selector, "QPushButton");
        assert_eq!(rules[0].declarations.get("background"), Some("white"));
        assert_eq!(rules[0].declarations.get("color"), Some("#202020"));
        assert_eq!(rules[0].condition, None);
        assert_eq!(rules[0].line, Some(1));
    }

    #[test]
    fn test_qt_selectors_are_kept_verbatim() {
        let rules = parse(
            r#"
            QPushButton#sendButton:hover { color: red; }
            QLabel[role="assistant"] { color: blue; }
            QScrollBar::handle:vertical { min-height: 20px; }
            "#,
        );
        let selectors: Vec<&str> = rules.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(
            selectors,
            vec![
                "QPushButton#sendButton:hover",
                r#"QLabel[role="assistant"]"#,
                "QScrollBar::handle:vertical",
            ]
        );
    }

    #[test]
    fn test_descendant_selector_whitespace_collapsed() {
        let rules = parse("QListView   QLabel\n  { color: gray; }");
        assert_eq!(rules[0].selector, "QListView QLabel");
    }

    #[test]
    fn test_selector_list_fans_out() {
        let rules = parse("QPushButton, QToolButton { border: none; }");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selector, "QPushButton");
        assert_eq!(rules[1].selector, "QToolButton");
        assert_eq!(rules[1].declarations.get("border"), Some("none"));
    }

    #[test]
    fn test_values_kept_verbatim() {
        let rules = parse(
            "QWidget { background: qlineargradient(x1:0, y1:0, x2:0, y2:1, stop:0 #fff, stop:1 #eee); border: 1px solid rgba(0, 0, 0, 0.2); }",
        );
        let decls = &rules[0].declarations;
        assert_eq!(
            decls.get("background"),
            Some("qlineargradient(x1:0, y1:0, x2:0, y2:1, stop:0 #fff, stop:1 #eee)")
        );
        assert_eq!(decls.get("border"), Some("1px solid rgba(0, 0, 0, 0.2)"));
    }

    #[test]
    fn test_comments_are_ignored() {
        let rules = parse("/* header */ QLabel /* note */ { color: red /* why */; }");
        assert_eq!(rules[0].selector, "QLabel");
        assert_eq!(rules[0].declarations.get("color"), Some("red"));
    }

    #[test]
    fn test_duplicate_property_last_wins() {
        let rules = parse("QLabel { color: red; color: blue; }");
        assert_eq!(rules[0].declarations.get("color"), Some("blue"));
        assert_eq!(rules[0].declarations.len(), 1);
    }

    #[test]
    fn test_media_dark_block() {
        let rules = parse(
            "QLabel { color: black; }\n@media (prefers-color-scheme: dark) {\n  QLabel { color: white; }\n}",
        );
        assert_eq!(rules.len(), 2);
        assert!(rules[1].applies_to(&StyleContext::dark()));
        assert!(!rules[1].applies_to(&StyleContext::light()));
        assert_eq!(rules[1].line, Some(3));
    }

    #[test]
    fn test_context_block_and_nesting() {
        let rules = parse(
            "@context compact { @media (prefers-color-scheme: dark) { QLabel { padding: 1px; } } }",
        );
        let condition = rules[0].condition.as_ref().unwrap();
        assert_eq!(condition.to_string(), "compact+dark");
    }

    #[test]
    fn test_missing_block_at_end_is_error() {
        let err = parse_qss("chat", "QLabel { color: red; }\nQPushButton").unwrap_err();
        assert_eq!(err.layer, "chat");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_semicolon_instead_of_block_is_error() {
        let err = parse_qss("chat", "QLabel;\nQPushButton { color: red; }").unwrap_err();
        assert_eq!(err.line, Some(1));
        assert!(err.message.contains("property block"));
    }

    #[test]
    fn test_empty_value_is_error() {
        let err = parse_qss("base", "QLabel {\n  color: ;\n}").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("color"));
    }

    #[test]
    fn test_missing_colon_is_error() {
        assert!(parse_qss("base", "QLabel { color red; }").is_err());
    }

    #[test]
    fn test_empty_selector_is_error() {
        assert!(parse_qss("base", "{ color: red; }").is_err());
        assert!(parse_qss("base", "QLabel, { color: red; }").is_err());
    }

    #[test]
    fn test_unknown_at_rule_is_error() {
        let err = parse_qss("base", "@import url(other.qss);").unwrap_err();
        assert!(err.message.contains("import"));
    }

    #[test]
    fn test_unsupported_media_query_is_error() {
        assert!(parse_qss("base", "@media (max-width: 100px) { QLabel { color: red; } }").is_err());
        assert!(
            parse_qss("base", "@media (prefers-color-scheme: sepia) { QLabel { color: red; } }")
                .is_err()
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("  /* nothing */  ").is_empty());
    }

    #[test]
    fn test_unterminated_comment_ends_value() {
        let rules = parse("QLabel { color: red /* open");
        assert_eq!(rules[0].declarations.get("color"), Some("red"));
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let rules = parse(r#"QLabel[title="a/*b*/c"] { qproperty-text: "x /* y"; color: red; }"#);
        assert_eq!(rules[0].selector, r#"QLabel[title="a/*b*/c"]"#);
        assert_eq!(rules[0].declarations.get("qproperty-text"), Some(r#""x /* y""#));
        assert_eq!(rules[0].declarations.get("color"), Some("red"));
    }

    #[test]
    fn test_comments_inside_blocks_are_dropped() {
        let rules = parse("QLabel[ role = /* x */ \"user\" ] { border: rgba( 0, /* alpha */ 0, 0, 0.2 ); }");
        assert_eq!(rules[0].selector, r#"QLabel[role = "user"]"#);
        assert_eq!(rules[0].declarations.get("border"), Some("rgba(0, 0, 0, 0.2)"));
    }
}
