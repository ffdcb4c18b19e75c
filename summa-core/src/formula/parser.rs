//! Formula parser implementing recursive descent with operator precedence
//!
//! Converts formula text into an AST. Selector keywords and procedure names
//! are recognized during lexing; unrecognized identifiers surface as unknown
//! selectors rather than syntax errors.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use summa_math::Rational;

use crate::account::AccountKind;
use crate::broadcast::BinaryOp;
use crate::formula::{FormulaError, FormulaNode, Procedure, SelectorSpec};

/// Result type for parsing
pub type ParseResult<T> = Result<T, FormulaError>;

/// Token types for lexical analysis
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(Decimal),

    // Selector keywords and procedures
    Kind(AccountKind),
    Collection,
    Activity,
    Procedure(Procedure),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,

    // Special
    EndOfInput,
}

impl Token {
    /// Convert token to a binary operator if possible
    fn to_binary_op(&self) -> Option<BinaryOp> {
        match self {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Mod),
            Token::Caret => Some(BinaryOp::Pow),
            Token::Equal => Some(BinaryOp::Eq),
            Token::NotEqual => Some(BinaryOp::Ne),
            Token::Less => Some(BinaryOp::Lt),
            Token::Greater => Some(BinaryOp::Gt),
            Token::LessEqual => Some(BinaryOp::Le),
            Token::GreaterEqual => Some(BinaryOp::Ge),
            _ => None,
        }
    }
}

/// Column tracking for error reporting
#[derive(Debug, Clone, Copy)]
struct Position {
    column: usize,
}

impl Position {
    fn new() -> Self {
        Position { column: 1 }
    }

    fn advance(&mut self) {
        self.column += 1;
    }
}

/// Lexer for tokenizing formula strings
struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    position: Position,
    keywords: HashMap<&'static str, Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut keywords = HashMap::new();

        keywords.insert("COLLECTION", Token::Collection);
        keywords.insert("CASH_FLOW_ACTIVITY", Token::Activity);

        keywords.insert("ASSET_ACCOUNTS", Token::Kind(AccountKind::Asset));
        keywords.insert("LIABILITY_ACCOUNTS", Token::Kind(AccountKind::Liability));
        keywords.insert("EQUITY_ACCOUNTS", Token::Kind(AccountKind::Equity));
        keywords.insert("INCOME_ACCOUNTS", Token::Kind(AccountKind::Income));
        keywords.insert("EXPENSE_ACCOUNTS", Token::Kind(AccountKind::Expense));

        keywords.insert(
            "TOTAL_OPENED_DEBIT_AMOUNT",
            Token::Procedure(Procedure::TotalOpenedDebitAmount),
        );
        keywords.insert(
            "TOTAL_OPENED_CREDIT_AMOUNT",
            Token::Procedure(Procedure::TotalOpenedCreditAmount),
        );
        keywords.insert(
            "TOTAL_UNADJUSTED_DEBIT_AMOUNT",
            Token::Procedure(Procedure::TotalUnadjustedDebitAmount),
        );
        keywords.insert(
            "TOTAL_UNADJUSTED_CREDIT_AMOUNT",
            Token::Procedure(Procedure::TotalUnadjustedCreditAmount),
        );
        keywords.insert(
            "TOTAL_CLOSED_DEBIT_AMOUNT",
            Token::Procedure(Procedure::TotalClosedDebitAmount),
        );
        keywords.insert(
            "TOTAL_CLOSED_CREDIT_AMOUNT",
            Token::Procedure(Procedure::TotalClosedCreditAmount),
        );
        keywords.insert(
            "TOTAL_NET_CASH_FLOW_AMOUNT",
            Token::Procedure(Procedure::TotalNetCashFlowAmount),
        );

        Self { input: input.chars().peekable(), position: Position::new(), keywords }
    }

    fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::EndOfInput;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();
        let Some(&ch) = self.input.peek() else {
            return Ok(Token::EndOfInput);
        };

        if ch.is_ascii_digit() {
            return self.lex_number();
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.lex_word());
        }

        self.bump();
        match ch {
            '+' => Ok(Token::Plus),
            '-' => Ok(Token::Minus),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '%' => Ok(Token::Percent),
            '^' => Ok(Token::Caret),
            '(' => Ok(Token::LeftParen),
            ')' => Ok(Token::RightParen),
            '[' => Ok(Token::LeftBracket),
            ']' => Ok(Token::RightBracket),
            ',' => Ok(Token::Comma),
            '=' => {
                if self.eat('=') {
                    Ok(Token::Equal)
                } else {
                    Err(self.error("'=' must be '=='"))
                }
            }
            '!' => {
                if self.eat('=') {
                    Ok(Token::NotEqual)
                } else {
                    Err(self.error("'!' must be '!='"))
                }
            }
            '<' => {
                if self.eat('=') {
                    Ok(Token::LessEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            '>' => {
                if self.eat('=') {
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            other => Err(self.error(&format!("unexpected character '{}'", other))),
        }
    }

    fn lex_number(&mut self) -> ParseResult<Token> {
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.bump();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let decimal =
            text.parse::<Decimal>().map_err(|e| self.error(&format!("bad number {}: {}", text, e)))?;
        Ok(Token::Number(decimal))
    }

    fn lex_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        match self.keywords.get(word.as_str()) {
            Some(token) => token.clone(),
            None => Token::Identifier(word),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.input.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.input.next();
        self.position.advance();
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.input.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> FormulaError {
        FormulaError::InvalidSyntax(format!("column {}: {}", self.position.column, message))
    }
}

/// Parser consuming the token stream
struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

/// Parse a formula string into its AST
pub fn parse(input: &str) -> ParseResult<FormulaNode> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser { tokens, index: 0 };
    let node = parser.parse_expression(0)?;
    parser.expect_end()?;
    Ok(node)
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.index).unwrap_or(&Token::EndOfInput)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.index += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        let found = self.advance();
        if found == expected {
            Ok(())
        } else {
            Err(FormulaError::InvalidSyntax(format!(
                "expected {:?}, found {:?}",
                expected, found
            )))
        }
    }

    fn expect_end(&mut self) -> ParseResult<()> {
        match self.peek() {
            Token::EndOfInput => Ok(()),
            other => {
                Err(FormulaError::InvalidSyntax(format!("unexpected trailing {:?}", other)))
            }
        }
    }

    fn parse_expression(&mut self, min_precedence: u8) -> ParseResult<FormulaNode> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek().to_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let next_min =
                if op.is_right_associative() { precedence } else { precedence + 1 };
            let right = self.parse_expression(next_min)?;
            left = FormulaNode::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<FormulaNode> {
        if self.peek() == &Token::Minus {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(FormulaNode::Negate(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<FormulaNode> {
        match self.advance() {
            Token::Number(decimal) => Ok(FormulaNode::Literal(Rational::from_decimal(decimal))),
            Token::Kind(kind) => Ok(FormulaNode::Selector(SelectorSpec::Kind(kind))),
            Token::Collection => {
                let id = self.parse_bracketed_id("COLLECTION")?;
                Ok(FormulaNode::Selector(SelectorSpec::Collection(id)))
            }
            Token::Activity => {
                let id = self.parse_bracketed_id("CASH_FLOW_ACTIVITY")?;
                Ok(FormulaNode::Selector(SelectorSpec::Activity(id)))
            }
            Token::Procedure(procedure) => {
                self.expect(Token::LeftParen)?;
                let mut args = vec![self.parse_expression(0)?];
                while self.peek() == &Token::Comma {
                    self.advance();
                    args.push(self.parse_expression(0)?);
                }
                self.expect(Token::RightParen)?;
                Ok(FormulaNode::Call { procedure, args })
            }
            Token::LeftParen => {
                let inner = self.parse_expression(0)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::Identifier(name) => Err(FormulaError::UnknownSelector(name)),
            other => {
                Err(FormulaError::InvalidSyntax(format!("unexpected token {:?}", other)))
            }
        }
    }

    fn parse_bracketed_id(&mut self, selector: &str) -> ParseResult<u64> {
        self.expect(Token::LeftBracket)?;
        let id = match self.advance() {
            Token::Number(decimal) if decimal.fract().is_zero() => {
                decimal.to_u64().ok_or_else(|| {
                    FormulaError::InvalidSyntax(format!("{}[{}] id out of range", selector, decimal))
                })?
            }
            other => {
                return Err(FormulaError::InvalidSyntax(format!(
                    "{} requires an integer id, found {:?}",
                    selector, other
                )))
            }
        };
        self.expect(Token::RightBracket)?;
        Ok(id)
    }
}
