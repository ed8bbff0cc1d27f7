use std::fmt::{Display, Formatter, Write};

use itertools::Itertools;

use crate::memo::expr::{FieldValue, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::operators::Operator;
use crate::properties::logical::LogicalProps;

impl Memo {
    /// Formats an expression as `Operator field1 field2 ..`. Groups are written as their identifiers,
    /// lists as `[g1, g2]` and private values via their `Display` impl.
    pub fn format_expr(&self, expr: &MemoExpr) -> String {
        let mut buf = String::new();
        buf.push_str(expr.op().name());
        for field in expr.fields() {
            buf.push(' ');
            let _ = match field {
                FieldValue::Group(g) => write!(buf, "{}", g),
                FieldValue::List(l) => write!(buf, "[{}]", self.list(l).iter().join(", ")),
                FieldValue::Private(p) => write!(buf, "{}", self.private(p)),
            };
        }
        buf
    }
}

fn format_props(props: &LogicalProps) -> String {
    match props {
        LogicalProps::Scalar(props) => format!("unbound={}", props.unbound_cols),
        LogicalProps::Relational(props) => {
            let mut buf = format!("output={}", props.output_cols);
            if !props.not_null_cols.is_empty() {
                let _ = write!(buf, " not_null={}", props.not_null_cols);
            }
            if !props.weak_keys.is_empty() {
                let _ = write!(buf, " keys=[{}]", props.weak_keys.iter().join(", "));
            }
            if !props.equiv_cols.is_empty() {
                let _ = write!(buf, " equiv=[{}]", props.equiv_cols.iter().join(", "));
            }
            if !props.unbound_cols.is_empty() {
                let _ = write!(buf, " unbound={}", props.unbound_cols);
            }
            buf
        }
    }
}

impl Display for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for group in self.groups() {
            writeln!(f, "{} {}", group.id(), format_props(group.props()))?;
            for offset in group.exprs() {
                writeln!(f, "  {}", self.format_expr(&self.expr(*offset)))?;
            }
        }
        Ok(())
    }
}

impl Memo {
    /// Formats a scalar expression in an infix notation. Variables are written as `col:N`.
    pub fn format_scalar(&self, group: GroupId) -> String {
        let expr = self.normal_expr(group);
        let op = expr.op();
        match op {
            Operator::Variable | Operator::Const => format!("{}", self.private(expr.private_field(0))),
            Operator::Filters => format!("[{}]", self.list(expr.list_field(0)).iter().map(|g| self.format_scalar(*g)).join(", ")),
            Operator::List => format!("({})", self.list(expr.list_field(0)).iter().map(|g| self.format_scalar(*g)).join(", ")),
            Operator::Not => format!("NOT {}", self.format_operand(expr.group_field(0))),
            Operator::Exists => format!("EXISTS({})", expr.group_field(0)),
            Operator::Subquery => format!("SUBQUERY({})", expr.group_field(0)),
            Operator::Function => format!(
                "{}({})",
                self.private(expr.private_field(1)),
                self.list(expr.list_field(0)).iter().map(|g| self.format_scalar(*g)).join(", ")
            ),
            Operator::Projections | Operator::Aggregations => {
                let items = self.list(expr.list_field(0));
                let cols = self.projection_columns(group);
                let items = items
                    .iter()
                    .zip(cols.iter())
                    .map(|(item, col)| match self.as_column(*item) {
                        Some(c) if c == *col => format!("col:{}", c),
                        _ => format!("{} AS col:{}", self.format_scalar(*item), col),
                    })
                    .join(", ");
                format!("[{}]", items)
            }
            _ => match (op.symbol(), expr.as_binary()) {
                (Some(symbol), Some((l, r))) => {
                    format!("{} {} {}", self.format_operand(l), symbol, self.format_operand(r))
                }
                _ => self.format_expr(&expr),
            },
        }
    }

    fn format_operand(&self, group: GroupId) -> String {
        let op = self.normal_expr(group).op();
        if op.symbol().is_some() {
            format!("({})", self.format_scalar(group))
        } else {
            self.format_scalar(group)
        }
    }
}
