use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperator {
    #[default]
    And,
    Or,
}

impl BooleanOperator {
    fn as_sql(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValue {
    #[default]
    None,
    Single(SqlValue),
    List(Vec<SqlValue>),
}

/// One term of a WHERE clause. Conditions are kept as a flat list; grouping is
/// expressed through open/close parenthesis counts, and the boolean operator
/// joins a condition to the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub boolean_operator: BooleanOperator,
    pub open_parens: u8,
    pub table: Option<String>,
    pub column: String,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    pub close_parens: u8,
}

/// SQL text with `?` placeholders and the values to bind, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedSql {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

impl RenderedSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn append(&mut self, other: RenderedSql) {
        self.sql.push_str(&other.sql);
        self.binds.extend(other.binds);
    }
}

impl FilterCondition {
    pub fn new(
        column: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<SqlValue>,
    ) -> Self {
        Self {
            boolean_operator: BooleanOperator::And,
            open_parens: 0,
            table: None,
            column: column.into(),
            operator,
            value: ConditionValue::Single(value.into()),
            close_parens: 0,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(column, ConditionOperator::Eq, value)
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self {
            boolean_operator: BooleanOperator::And,
            open_parens: 0,
            table: None,
            column: column.into(),
            operator: ConditionOperator::In,
            value: ConditionValue::List(values.into_iter().map(Into::into).collect()),
            close_parens: 0,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            boolean_operator: BooleanOperator::And,
            open_parens: 0,
            table: None,
            column: column.into(),
            operator: ConditionOperator::IsNull,
            value: ConditionValue::None,
            close_parens: 0,
        }
    }

    pub fn or(mut self) -> Self {
        self.boolean_operator = BooleanOperator::Or;
        self
    }

    pub fn open(mut self) -> Self {
        self.open_parens += 1;
        self
    }

    pub fn close(mut self) -> Self {
        self.close_parens += 1;
        self
    }

    pub fn qualified(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Number of values this condition binds.
    pub fn value_count(&self) -> usize {
        match &self.value {
            ConditionValue::None => 0,
            ConditionValue::Single(_) => 1,
            ConditionValue::List(values) => values.len(),
        }
    }

    fn render_term(&self) -> RenderedSql {
        let column = match &self.table {
            Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(&self.column)),
            None => quote_identifier(&self.column),
        };
        let mut out = RenderedSql::default();
        match (&self.operator, &self.value) {
            (ConditionOperator::IsNull, _) => out.sql = format!("{} IS NULL", column),
            (ConditionOperator::IsNotNull, _) => out.sql = format!("{} IS NOT NULL", column),
            (ConditionOperator::In | ConditionOperator::NotIn, ConditionValue::List(values)) => {
                if values.is_empty() {
                    // An empty IN list matches nothing; NOT IN matches everything.
                    out.sql = if self.operator == ConditionOperator::In {
                        "1 = 0".to_string()
                    } else {
                        "1 = 1".to_string()
                    };
                } else {
                    let keyword = if self.operator == ConditionOperator::In {
                        "IN"
                    } else {
                        "NOT IN"
                    };
                    let placeholders = vec!["?"; values.len()].join(", ");
                    out.sql = format!("{} {} ({})", column, keyword, placeholders);
                    out.binds.extend(values.iter().cloned());
                }
            }
            (op, value) => {
                let symbol = match op {
                    ConditionOperator::Eq | ConditionOperator::In => "=",
                    ConditionOperator::NotEq | ConditionOperator::NotIn => "<>",
                    ConditionOperator::Lt => "<",
                    ConditionOperator::LtEq => "<=",
                    ConditionOperator::Gt => ">",
                    ConditionOperator::GtEq => ">=",
                    ConditionOperator::IsNull | ConditionOperator::IsNotNull => unreachable!(),
                };
                let bound = match value {
                    ConditionValue::Single(v) => v.clone(),
                    ConditionValue::List(values) => values.first().cloned().unwrap_or_default(),
                    ConditionValue::None => SqlValue::Null,
                };
                out.sql = format!("{} {} ?", column, symbol);
                out.binds.push(bound);
            }
        }
        out
    }

    /// Evaluates this single term against a row.
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<SqlValue>,
    {
        let actual = lookup(&self.column).unwrap_or(SqlValue::Null);
        match (&self.operator, &self.value) {
            (ConditionOperator::IsNull, _) => actual.is_null(),
            (ConditionOperator::IsNotNull, _) => !actual.is_null(),
            (ConditionOperator::In, ConditionValue::List(values)) => values
                .iter()
                .any(|v| actual.compare(v) == Some(Ordering::Equal)),
            (ConditionOperator::NotIn, ConditionValue::List(values)) => {
                !actual.is_null()
                    && values
                        .iter()
                        .all(|v| actual.compare(v) != Some(Ordering::Equal))
            }
            (op, value) => {
                let expected = match value {
                    ConditionValue::Single(v) => v.clone(),
                    ConditionValue::List(values) => values.first().cloned().unwrap_or_default(),
                    ConditionValue::None => SqlValue::Null,
                };
                let ordering = actual.compare(&expected);
                match op {
                    ConditionOperator::Eq | ConditionOperator::In => ordering == Some(Ordering::Equal),
                    ConditionOperator::NotEq | ConditionOperator::NotIn => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Greater))
                    }
                    ConditionOperator::Lt => ordering == Some(Ordering::Less),
                    ConditionOperator::LtEq => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                    }
                    ConditionOperator::Gt => ordering == Some(Ordering::Greater),
                    ConditionOperator::GtEq => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    ConditionOperator::IsNull | ConditionOperator::IsNotNull => unreachable!(),
                }
            }
        }
    }
}

pub fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// Renders a condition list. `is_first` controls whether the clause opens the
/// WHERE (`WHERE ...`) or continues an existing one (`AND (...)`).
pub fn render_where_clause(conditions: &[FilterCondition], is_first: bool) -> RenderedSql {
    if conditions.is_empty() {
        return RenderedSql::default();
    }
    let mut out = RenderedSql::new(if is_first { " WHERE " } else { " AND (" });
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            out.push_sql(" ");
            out.push_sql(condition.boolean_operator.as_sql());
            out.push_sql(" ");
        }
        for _ in 0..condition.open_parens {
            out.push_sql("(");
        }
        out.append(condition.render_term());
        for _ in 0..condition.close_parens {
            out.push_sql(")");
        }
    }
    if !is_first {
        out.push_sql(")");
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Value(bool),
    And,
    Or,
    Open,
    Close,
}

/// Evaluates a condition list against an in-memory row with SQL precedence
/// (AND binds tighter than OR). An empty list matches every row.
pub fn evaluate_conditions<F>(conditions: &[FilterCondition], lookup: F) -> bool
where
    F: Fn(&str) -> Option<SqlValue>,
{
    if conditions.is_empty() {
        return true;
    }
    let mut tokens = Vec::new();
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            tokens.push(match condition.boolean_operator {
                BooleanOperator::And => Token::And,
                BooleanOperator::Or => Token::Or,
            });
        }
        for _ in 0..condition.open_parens {
            tokens.push(Token::Open);
        }
        tokens.push(Token::Value(condition.matches(&lookup)));
        for _ in 0..condition.close_parens {
            tokens.push(Token::Close);
        }
    }
    let mut pos = 0;
    parse_or(&tokens, &mut pos)
}

fn parse_or(tokens: &[Token], pos: &mut usize) -> bool {
    let mut result = parse_and(tokens, pos);
    while let Some(Token::Or) = tokens.get(*pos) {
        *pos += 1;
        let rhs = parse_and(tokens, pos);
        result = result || rhs;
    }
    result
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> bool {
    let mut result = parse_factor(tokens, pos);
    while let Some(Token::And) = tokens.get(*pos) {
        *pos += 1;
        let rhs = parse_factor(tokens, pos);
        result = result && rhs;
    }
    result
}

fn parse_factor(tokens: &[Token], pos: &mut usize) -> bool {
    match tokens.get(*pos) {
        Some(Token::Open) => {
            *pos += 1;
            let inner = parse_or(tokens, pos);
            if let Some(Token::Close) = tokens.get(*pos) {
                *pos += 1;
            }
            inner
        }
        Some(Token::Value(v)) => {
            *pos += 1;
            *v
        }
        _ => false,
    }
}
