//! Restricted arithmetic formula evaluator for custom curves.
//!
//! Formulas are parsed once into an AST at configuration time and
//! evaluated against a closed variable set at pricing time. Anything
//! outside the grammar below is rejected at parse time:
//!
//! - numbers (decimal and scientific notation)
//! - variables: `initial_price`, `total_tokens_minted`, `slope`,
//!   `growth_rate`
//! - operators: `+ - * / ^`, unary minus, parentheses
//! - functions: `sqrt`, `exp`, `ln`, `log10`, `abs`, `floor`, `ceil`
//!   (one argument), `min`, `max`, `pow` (two arguments)

use thiserror::Error;

/// Error while parsing or evaluating a formula
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' takes {expected} argument(s), got {got}")]
    WrongArity { name: &'static str, expected: usize, got: usize },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Unexpected token at position {0}")]
    UnexpectedToken(usize),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Variable '{0}' is not set for this curve")]
    UnsetVariable(&'static str),

    #[error("Formula result is not a finite number")]
    NonFinite,
}

/// Variables available to a formula evaluation.
///
/// `slope` and `growth_rate` are optional curve parameters; referencing
/// an unset one is an evaluation error, never a silent default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaVars {
    pub initial_price: f64,
    pub total_tokens_minted: f64,
    pub slope: Option<f64>,
    pub growth_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    InitialPrice,
    TotalTokensMinted,
    Slope,
    GrowthRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sqrt,
    Exp,
    Ln,
    Log10,
    Abs,
    Floor,
    Ceil,
    Min,
    Max,
    Pow,
}

impl Func {
    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max | Func::Pow => 2,
            _ => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Sqrt => "sqrt",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Log10 => "log10",
            Func::Abs => "abs",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Min => "min",
            Func::Max => "max",
            Func::Pow => "pow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Var(Var),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// A parsed, validated formula.
#[derive(Debug, Clone)]
pub struct Formula {
    src: String,
    root: Expr,
}

impl Formula {
    /// Parse a formula, rejecting anything outside the closed grammar.
    pub fn parse(src: &str) -> Result<Formula, FormulaError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(FormulaError::UnexpectedToken(parser.current_pos()));
        }
        Ok(Formula {
            src: src.to_string(),
            root,
        })
    }

    /// Original formula text.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Evaluate against the given variables.
    pub fn eval(&self, vars: &FormulaVars) -> Result<f64, FormulaError> {
        let value = eval_expr(&self.root, vars)?;
        if !value.is_finite() {
            return Err(FormulaError::NonFinite);
        }
        Ok(value)
    }
}

fn eval_expr(expr: &Expr, vars: &FormulaVars) -> Result<f64, FormulaError> {
    match expr {
        Expr::Num(v) => Ok(*v),
        Expr::Var(var) => match var {
            Var::InitialPrice => Ok(vars.initial_price),
            Var::TotalTokensMinted => Ok(vars.total_tokens_minted),
            Var::Slope => vars.slope.ok_or(FormulaError::UnsetVariable("slope")),
            Var::GrowthRate => vars
                .growth_rate
                .ok_or(FormulaError::UnsetVariable("growth_rate")),
        },
        Expr::Neg(inner) => Ok(-eval_expr(inner, vars)?),
        Expr::Bin(op, lhs, rhs) => {
            let l = eval_expr(lhs, vars)?;
            let r = eval_expr(rhs, vars)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        Err(FormulaError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinOp::Pow => Ok(l.powf(r)),
            }
        }
        Expr::Call(func, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, vars)?);
            }
            Ok(match func {
                Func::Sqrt => values[0].sqrt(),
                Func::Exp => values[0].exp(),
                Func::Ln => values[0].ln(),
                Func::Log10 => values[0].log10(),
                Func::Abs => values[0].abs(),
                Func::Floor => values[0].floor(),
                Func::Ceil => values[0].ceil(),
                Func::Min => values[0].min(values[1]),
                Func::Max => values[0].max(values[1]),
                Func::Pow => values[0].powf(values[1]),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            '^' => {
                tokens.push((Token::Caret, i));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific notation: e/E followed by optional sign.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                tokens.push((Token::Num(value), start));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(text), start));
            }
            other => return Err(FormulaError::UnexpectedChar(other, i)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(self.tokens.len())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            Some(_) => Err(FormulaError::UnexpectedToken(self.current_pos())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // Unary minus binds looser than '^': `-x^2` is `-(x^2)`.
    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            // Right-associative exponent.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Bin(
                BinOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let func = lookup_function(&name)?;
                    let mut args = vec![self.parse_expr()?];
                    while matches!(self.peek(), Some(Token::Comma)) {
                        self.advance();
                        args.push(self.parse_expr()?);
                    }
                    self.expect(Token::RParen)?;
                    if args.len() != func.arity() {
                        return Err(FormulaError::WrongArity {
                            name: func.name(),
                            expected: func.arity(),
                            got: args.len(),
                        });
                    }
                    Ok(Expr::Call(func, args))
                } else {
                    lookup_variable(&name).map(Expr::Var)
                }
            }
            Some(_) => Err(FormulaError::UnexpectedToken(self.current_pos())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn lookup_variable(name: &str) -> Result<Var, FormulaError> {
    match name {
        "initial_price" => Ok(Var::InitialPrice),
        "total_tokens_minted" => Ok(Var::TotalTokensMinted),
        "slope" => Ok(Var::Slope),
        "growth_rate" => Ok(Var::GrowthRate),
        other => Err(FormulaError::UnknownIdentifier(other.to_string())),
    }
}

fn lookup_function(name: &str) -> Result<Func, FormulaError> {
    match name {
        "sqrt" => Ok(Func::Sqrt),
        "exp" => Ok(Func::Exp),
        "ln" => Ok(Func::Ln),
        "log10" => Ok(Func::Log10),
        "abs" => Ok(Func::Abs),
        "floor" => Ok(Func::Floor),
        "ceil" => Ok(Func::Ceil),
        "min" => Ok(Func::Min),
        "max" => Ok(Func::Max),
        "pow" => Ok(Func::Pow),
        other => Err(FormulaError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> FormulaVars {
        FormulaVars {
            initial_price: 1e-7,
            total_tokens_minted: 100.0,
            slope: Some(1e-9),
            growth_rate: None,
        }
    }

    #[test]
    fn test_linear_style_formula() {
        let formula = Formula::parse("initial_price + slope * total_tokens_minted").unwrap();
        let value = formula.eval(&vars()).unwrap();
        assert!((value - 2e-7).abs() < 1e-20);
    }

    #[test]
    fn test_precedence_and_parens() {
        let f = Formula::parse("2 + 3 * 4").unwrap();
        assert_eq!(f.eval(&FormulaVars::default()).unwrap(), 14.0);

        let f = Formula::parse("(2 + 3) * 4").unwrap();
        assert_eq!(f.eval(&FormulaVars::default()).unwrap(), 20.0);

        let f = Formula::parse("2 ^ 3 ^ 2").unwrap();
        assert_eq!(f.eval(&FormulaVars::default()).unwrap(), 512.0);

        let f = Formula::parse("-2 ^ 2").unwrap();
        assert_eq!(f.eval(&FormulaVars::default()).unwrap(), -4.0);
    }

    #[test]
    fn test_functions() {
        let f = Formula::parse("sqrt(total_tokens_minted)").unwrap();
        assert_eq!(f.eval(&vars()).unwrap(), 10.0);

        let f = Formula::parse("max(initial_price, slope)").unwrap();
        assert_eq!(f.eval(&vars()).unwrap(), 1e-7);

        let f = Formula::parse("min(1, 2) + pow(2, 10)").unwrap();
        assert_eq!(f.eval(&FormulaVars::default()).unwrap(), 1025.0);
    }

    #[test]
    fn test_scientific_notation() {
        let f = Formula::parse("1e-6 + 2.5E3").unwrap();
        let value = f.eval(&FormulaVars::default()).unwrap();
        assert!((value - 2500.000001).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_identifier_rejected_at_parse() {
        let err = Formula::parse("initial_price + reserve").unwrap_err();
        assert!(matches!(err, FormulaError::UnknownIdentifier(_)));
    }

    #[test]
    fn test_unknown_function_rejected_at_parse() {
        let err = Formula::parse("eval(1)").unwrap_err();
        assert!(matches!(err, FormulaError::UnknownFunction(_)));
    }

    #[test]
    fn test_wrong_arity_rejected_at_parse() {
        let err = Formula::parse("min(1)").unwrap_err();
        assert!(matches!(err, FormulaError::WrongArity { .. }));

        let err = Formula::parse("sqrt(1, 2)").unwrap_err();
        assert!(matches!(err, FormulaError::WrongArity { .. }));
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = Formula::parse("1 + 2 3").unwrap_err();
        assert!(matches!(err, FormulaError::UnexpectedToken(_)));
    }

    #[test]
    fn test_division_by_zero_at_eval() {
        let f = Formula::parse("1 / growth_rate").unwrap();
        let mut v = FormulaVars::default();
        v.growth_rate = Some(0.0);
        assert_eq!(f.eval(&v).unwrap_err(), FormulaError::DivisionByZero);
    }

    #[test]
    fn test_unset_variable_at_eval() {
        let f = Formula::parse("growth_rate * 2").unwrap();
        let err = f.eval(&vars()).unwrap_err();
        assert_eq!(err, FormulaError::UnsetVariable("growth_rate"));
    }

    #[test]
    fn test_non_finite_result() {
        let f = Formula::parse("ln(0 - 1)").unwrap();
        assert_eq!(
            f.eval(&FormulaVars::default()).unwrap_err(),
            FormulaError::NonFinite
        );
    }
}
