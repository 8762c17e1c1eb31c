//! Recursive-descent parser.

use super::ast::{CompareOp, Expr, Projection, Statement};
use super::error::{SqlError, SqlResult};
use super::lexer::{tokenize, Token};
use colderstorage_codec::{Column, Type, Value};

/// Parses one statement.
///
/// # Errors
///
/// Returns [`SqlError::Parse`] for malformed text and
/// [`SqlError::Unsupported`] for statements outside the subset.
pub fn parse(sql: &str) -> SqlResult<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    while parser.eat(&Token::Semicolon) {}
    match parser.peek() {
        None => Ok(statement),
        Some(token) => Err(SqlError::parse(format!(
            "unexpected '{token}' after end of statement"
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> SqlResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{token}'")))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> SqlResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(kw))
        }
    }

    fn unexpected(&self, wanted: &str) -> SqlError {
        match self.peek() {
            Some(token) => SqlError::parse(format!("expected {wanted}, found '{token}'")),
            None => SqlError::parse(format!("expected {wanted}, found end of input")),
        }
    }

    fn identifier(&mut self) -> SqlResult<String> {
        match self.peek() {
            Some(Token::Word(w)) if !is_reserved(w) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            Some(Token::Quoted(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn statement(&mut self) -> SqlResult<Statement> {
        let Some(Token::Word(head)) = self.peek().cloned() else {
            return Err(self.unexpected("statement"));
        };
        self.pos += 1;
        match head.to_ascii_uppercase().as_str() {
            "CREATE" => self.create_table(),
            "DROP" => self.drop_table(),
            "INSERT" => self.insert(),
            "SELECT" => self.select(),
            "UPDATE" => self.update(),
            "DELETE" => self.delete(),
            "ALTER" | "BEGIN" | "COMMIT" | "ROLLBACK" | "WITH" | "EXPLAIN" | "PRAGMA" => {
                Err(SqlError::Unsupported(head))
            }
            _ => Err(SqlError::parse(format!("unknown statement '{head}'"))),
        }
    }

    fn create_table(&mut self) -> SqlResult<Statement> {
        if !self.eat_keyword("TABLE") {
            return Err(SqlError::Unsupported(
                "only CREATE TABLE is supported".into(),
            ));
        }
        let if_not_exists = if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let name = self.identifier()?;
        self.expect(&Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            let column = self.identifier()?;
            let ty = self.column_type()?;
            columns.push(Column::new(column, ty));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Statement::CreateTable {
            name,
            columns,
            if_not_exists,
        })
    }

    fn column_type(&mut self) -> SqlResult<Type> {
        let Some(Token::Word(word)) = self.peek().cloned() else {
            return Err(self.unexpected("column type"));
        };
        self.pos += 1;
        let ty = match word.to_ascii_uppercase().as_str() {
            "NULL" => Type::Null,
            "INTEGER" | "INT" | "BIGINT" => Type::Integer,
            "REAL" | "FLOAT" | "DOUBLE" => Type::Real,
            "TEXT" | "VARCHAR" | "STRING" => Type::Text,
            "BLOB" | "BYTES" => Type::Blob,
            _ => return Err(SqlError::parse(format!("unknown column type '{word}'"))),
        };
        // VARCHAR(255) and friends: the length is accepted and ignored.
        if self.eat(&Token::LParen) {
            match self.advance() {
                Some(Token::Number(_)) => {}
                _ => return Err(SqlError::parse("expected a type length")),
            }
            self.expect(&Token::RParen)?;
        }
        Ok(ty)
    }

    fn drop_table(&mut self) -> SqlResult<Statement> {
        if !self.eat_keyword("TABLE") {
            return Err(SqlError::Unsupported("only DROP TABLE is supported".into()));
        }
        let if_exists = if self.eat_keyword("IF") {
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let name = self.identifier()?;
        Ok(Statement::DropTable { name, if_exists })
    }

    fn insert(&mut self) -> SqlResult<Statement> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;
        let columns = if self.eat(&Token::LParen) {
            let names = self.identifier_list()?;
            self.expect(&Token::RParen)?;
            Some(names)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        let mut rows = Vec::new();
        loop {
            self.expect(&Token::LParen)?;
            let mut row = Vec::new();
            loop {
                row.push(self.literal()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
            rows.push(row);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Statement::Insert {
            table,
            columns,
            rows,
        })
    }

    fn select(&mut self) -> SqlResult<Statement> {
        let projection = if self.eat(&Token::Star) {
            Projection::All
        } else {
            Projection::Columns(self.identifier_list()?)
        };
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;
        let limit = if self.eat_keyword("LIMIT") {
            match self.advance() {
                Some(Token::Number(n)) => Some(
                    n.parse::<u64>()
                        .map_err(|_| SqlError::parse(format!("invalid LIMIT '{n}'")))?,
                ),
                _ => return Err(SqlError::parse("LIMIT needs a non-negative integer")),
            }
        } else {
            None
        };
        Ok(Statement::Select {
            table,
            projection,
            filter,
            limit,
        })
    }

    fn update(&mut self) -> SqlResult<Statement> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect(&Token::Eq)?;
            assignments.push((column, self.literal()?));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let filter = self.where_clause()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> SqlResult<Statement> {
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;
        Ok(Statement::Delete { table, filter })
    }

    fn identifier_list(&mut self) -> SqlResult<Vec<String>> {
        let mut names = vec![self.identifier()?];
        while self.eat(&Token::Comma) {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    fn where_clause(&mut self) -> SqlResult<Option<Expr>> {
        if self.eat_keyword("WHERE") {
            self.or_expr().map(Some)
        } else {
            Ok(None)
        }
    }

    fn or_expr(&mut self) -> SqlResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("OR") {
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and_expr()?));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> SqlResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword("AND") {
            lhs = Expr::And(Box::new(lhs), Box::new(self.not_expr()?));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> SqlResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> SqlResult<Expr> {
        let column = self.identifier()?;
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { column, negated });
        }
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.pos += 1;
        let value = self.literal()?;
        Ok(Expr::Compare { column, op, value })
    }

    fn literal(&mut self) -> SqlResult<Value> {
        let negative = self.eat(&Token::Minus);
        let value = match self.peek() {
            Some(Token::Number(n)) => number(n, negative)?,
            Some(Token::Text(s)) if !negative => Value::Text(s.clone()),
            Some(Token::Blob(b)) if !negative => Value::Blob(b.clone()),
            Some(t) if t.is_keyword("NULL") && !negative => Value::Null,
            _ => return Err(self.unexpected("literal")),
        };
        self.pos += 1;
        Ok(value)
    }
}

fn number(text: &str, negative: bool) -> SqlResult<Value> {
    let signed = if negative {
        format!("-{text}")
    } else {
        text.to_string()
    };
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return signed
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| SqlError::parse(format!("integer literal out of range: {signed}")));
    }
    signed
        .parse::<f64>()
        .map(Value::Real)
        .map_err(|_| SqlError::parse(format!("invalid number: {signed}")))
}

/// Words that can never be bare identifiers.
fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "AND", "CREATE", "DELETE", "DROP", "FROM", "INSERT", "INTO", "IS", "LIMIT", "NOT", "NULL",
        "OR", "SELECT", "SET", "TABLE", "UPDATE", "VALUES", "WHERE",
    ];
    RESERVED.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table() {
        let stmt = parse("create table if not exists Users (id INTEGER, name varchar(40), score REAL);")
            .unwrap();
        assert_eq!(
            stmt,
            Statement::CreateTable {
                name: "Users".into(),
                columns: vec![
                    Column::new("id", Type::Integer),
                    Column::new("name", Type::Text),
                    Column::new("score", Type::Real),
                ],
                if_not_exists: true,
            }
        );
    }

    #[test]
    fn insert_many_rows() {
        let stmt = parse("INSERT INTO t (a, b) VALUES (1, 'x'), (-2.5, NULL), (X'00', -7)").unwrap();
        let Statement::Insert { columns, rows, .. } = stmt else {
            panic!("not an insert");
        };
        assert_eq!(columns, Some(vec!["a".into(), "b".into()]));
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Text("x".into())],
                vec![Value::Real(-2.5), Value::Null],
                vec![Value::Blob(vec![0]), Value::Integer(-7)],
            ]
        );
    }

    #[test]
    fn select_with_precedence() {
        let stmt = parse("SELECT a, b FROM t WHERE a = 1 OR b > 2 AND NOT (c IS NULL) LIMIT 10").unwrap();
        let Statement::Select {
            projection,
            filter,
            limit,
            ..
        } = stmt
        else {
            panic!("not a select");
        };
        assert_eq!(projection, Projection::Columns(vec!["a".into(), "b".into()]));
        assert_eq!(limit, Some(10));
        let cmp = |column: &str, op, value| Expr::Compare {
            column: column.into(),
            op,
            value,
        };
        assert_eq!(
            filter,
            Some(Expr::Or(
                Box::new(cmp("a", CompareOp::Eq, Value::Integer(1))),
                Box::new(Expr::And(
                    Box::new(cmp("b", CompareOp::Gt, Value::Integer(2))),
                    Box::new(Expr::Not(Box::new(Expr::IsNull {
                        column: "c".into(),
                        negated: false,
                    }))),
                )),
            ))
        );
    }

    #[test]
    fn update_and_delete() {
        assert_eq!(
            parse("UPDATE t SET a = 1, b = 'z' WHERE id <> 3").unwrap(),
            Statement::Update {
                table: "t".into(),
                assignments: vec![("a".into(), Value::Integer(1)), ("b".into(), Value::Text("z".into()))],
                filter: Some(Expr::Compare {
                    column: "id".into(),
                    op: CompareOp::Ne,
                    value: Value::Integer(3),
                }),
            }
        );
        assert_eq!(
            parse("delete from t").unwrap(),
            Statement::Delete {
                table: "t".into(),
                filter: None
            }
        );
        assert_eq!(
            parse("DROP TABLE IF EXISTS t").unwrap(),
            Statement::DropTable {
                name: "t".into(),
                if_exists: true
            }
        );
    }

    #[test]
    fn integer_bounds() {
        assert!(matches!(
            parse("SELECT * FROM t WHERE a = -9223372036854775808").unwrap(),
            Statement::Select { filter: Some(Expr::Compare { value: Value::Integer(i64::MIN), .. }), .. }
        ));
        assert!(parse("SELECT * FROM t WHERE a = 9223372036854775808").is_err());
    }

    #[test]
    fn rejects_malformed_statements() {
        for sql in [
            "",
            "select from missing_table",
            "SELECT * FROM",
            "SELECT * FROM t WHERE",
            "INSERT INTO t VALUES (1,)",
            "CREATE TABLE t (a WIDGET)",
            "SELECT * FROM t extra",
            "SELECT * FROM t LIMIT -1",
            "INSERT INTO t VALUES (-'x')",
        ] {
            assert!(matches!(parse(sql), Err(SqlError::Parse(_))), "{sql}");
        }
        assert!(matches!(parse("BEGIN"), Err(SqlError::Unsupported(_))));
        assert!(matches!(parse("CREATE INDEX i ON t (a)"), Err(SqlError::Unsupported(_))));
    }
}
