use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::engine::{AvailabilityQuery, BookingUpdate, NewBooking, NewPayment, NewRoom};
use crate::model::*;

/// Row filter for `SELECT … FROM bookings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    Id(Ulid),
    Room(Ulid),
    Guest(Ulid),
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom(NewRoom),
    UpdateRoomStatus {
        id: Ulid,
        status: RoomStatus,
    },
    DeleteRoom {
        id: Ulid,
    },
    InsertBooking(NewBooking),
    /// `UPDATE bookings SET status = …` and nothing else.
    SetBookingStatus {
        id: Ulid,
        status: BookingStatus,
    },
    UpdateBooking {
        id: Ulid,
        update: BookingUpdate,
    },
    /// `DELETE FROM bookings` never removes the row; it cancels.
    CancelBooking {
        id: Ulid,
    },
    InsertPayment(NewPayment),
    SettlePayment {
        id: Ulid,
        status: PaymentStatus,
    },
    SelectRooms {
        id: Option<Ulid>,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectPayments {
        booking_id: Ulid,
    },
    SelectAvailability(AvailabilityQuery),
    SelectBalance {
        booking_id: Ulid,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

const ROOM_COLUMNS: [&str; 8] = [
    "id",
    "number",
    "room_type",
    "price",
    "capacity",
    "status",
    "amenities",
    "description",
];
const BOOKING_COLUMNS: [&str; 7] = [
    "id",
    "room_id",
    "guest_id",
    "check_in",
    "check_out",
    "guests",
    "total_price",
];
const BOOKING_UPDATE_COLUMNS: [&str; 6] = [
    "room_id",
    "check_in",
    "check_out",
    "guests",
    "status",
    "total_price",
];
const PAYMENT_COLUMNS: [&str; 4] = ["id", "booking_id", "amount", "method"];

/// Split a simple-query string on `;` outside quoted literals and identifiers.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                out.push(&sql[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    out.push(&sql[start..]);
    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if let Some(cmd) = parse_listen(trimmed) {
        return Ok(cmd);
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_listen(sql: &str) -> Option<Command> {
    let (head, rest) = sql.split_once(char::is_whitespace).unwrap_or((sql, ""));
    let channel = rest.trim().trim_matches('"').to_string();
    if head.eq_ignore_ascii_case("LISTEN") && !channel.is_empty() {
        Some(Command::Listen { channel })
    } else if head.eq_ignore_ascii_case("UNLISTEN") {
        if channel == "*" {
            Some(Command::UnlistenAll)
        } else if channel.is_empty() {
            None
        } else {
            Some(Command::Unlisten { channel })
        }
    } else {
        None
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    match table.as_str() {
        "rooms" => {
            let row = named_values(insert, &ROOM_COLUMNS)?;
            let status = match row.get("status") {
                Some(e) if !is_null(e) => parse_enum(e)?,
                _ => RoomStatus::Available,
            };
            let amenities = match row.get("amenities") {
                Some(e) => parse_text_or_null(e)?
                    .map(|s| split_amenities(&s))
                    .unwrap_or_default(),
                None => Vec::new(),
            };
            let description = match row.get("description") {
                Some(e) => parse_text_or_null(e)?,
                None => None,
            };
            Ok(Command::InsertRoom(NewRoom {
                id: parse_ulid(required(&row, "id")?)?,
                number: parse_text(required(&row, "number")?)?,
                room_type: parse_text(required(&row, "room_type")?)?,
                price: parse_decimal(required(&row, "price")?)?,
                capacity: parse_u32(required(&row, "capacity")?)?,
                status,
                amenities,
                description,
            }))
        }
        "bookings" => {
            let row = named_values(insert, &BOOKING_COLUMNS)?;
            Ok(Command::InsertBooking(NewBooking {
                id: parse_ulid(required(&row, "id")?)?,
                room_id: parse_ulid(required(&row, "room_id")?)?,
                guest_id: parse_ulid(required(&row, "guest_id")?)?,
                check_in: parse_date(required(&row, "check_in")?)?,
                check_out: parse_date(required(&row, "check_out")?)?,
                guests: parse_u32(required(&row, "guests")?)?,
                total_price: parse_decimal(required(&row, "total_price")?)?,
            }))
        }
        "payments" => {
            let row = named_values(insert, &PAYMENT_COLUMNS)?;
            Ok(Command::InsertPayment(NewPayment {
                id: parse_ulid(required(&row, "id")?)?,
                booking_id: parse_ulid(required(&row, "booking_id")?)?,
                amount: parse_decimal(required(&row, "amount")?)?,
                method: parse_enum(required(&row, "method")?)?,
            }))
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn split_amenities(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Pair the single VALUES row with its column names. Without a column list
/// the values are taken positionally against `positional`.
fn named_values(
    insert: &ast::Insert,
    positional: &[&'static str],
) -> Result<HashMap<String, Expr>, SqlError> {
    let values = extract_insert_values(insert)?;
    let names: Vec<String> = if insert.columns.is_empty() {
        if values.len() > positional.len() {
            return Err(SqlError::WrongArity(positional.len(), values.len()));
        }
        positional.iter().map(|c| c.to_string()).collect()
    } else {
        if insert.columns.len() != values.len() {
            return Err(SqlError::WrongArity(insert.columns.len(), values.len()));
        }
        insert
            .columns
            .iter()
            .map(|c| c.value.to_lowercase())
            .collect()
    };
    Ok(names.into_iter().zip(values).collect())
}

fn required<'a>(row: &'a HashMap<String, Expr>, col: &'static str) -> Result<&'a Expr, SqlError> {
    row.get(col).ok_or(SqlError::MissingColumn(col))
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_eq(selection, "id")?;
    let mut set: HashMap<String, &Expr> = HashMap::new();
    for a in assignments {
        let col = match &a.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            AssignmentTarget::Tuple(_) => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        set.insert(col, &a.value);
    }

    match table.as_str() {
        "rooms" => match (set.len(), set.get("status")) {
            (1, Some(e)) => Ok(Command::UpdateRoomStatus {
                id,
                status: parse_enum(e)?,
            }),
            _ => Err(SqlError::Unsupported("rooms: only SET status".into())),
        },
        "bookings" => {
            if let (1, Some(e)) = (set.len(), set.get("status")) {
                return Ok(Command::SetBookingStatus {
                    id,
                    status: parse_enum(e)?,
                });
            }
            let missing: Vec<&str> = BOOKING_UPDATE_COLUMNS
                .iter()
                .copied()
                .filter(|c| !set.contains_key(*c))
                .collect();
            if !missing.is_empty() {
                return Err(SqlError::MissingFields(missing.join(", ")));
            }
            let get = |c: &str| {
                set.get(c)
                    .copied()
                    .ok_or_else(|| SqlError::MissingFields(c.to_string()))
            };
            Ok(Command::UpdateBooking {
                id,
                update: BookingUpdate {
                    room_id: parse_ulid(get("room_id")?)?,
                    check_in: parse_date(get("check_in")?)?,
                    check_out: parse_date(get("check_out")?)?,
                    guests: parse_u32(get("guests")?)?,
                    status: parse_enum(get("status")?)?,
                    total_price: parse_decimal(get("total_price")?)?,
                },
            })
        }
        "payments" => match (set.len(), set.get("status")) {
            (1, Some(e)) => Ok(Command::SettlePayment {
                id,
                status: parse_enum(e)?,
            }),
            _ => Err(SqlError::Unsupported("payments: only SET status".into())),
        },
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_eq(&delete.selection, "id")?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "bookings" => Ok(Command::CancelBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms {
            id: filters.eq_ulid("id")?,
        }),
        "bookings" => {
            let filter = if let Some(id) = filters.eq_ulid("id")? {
                BookingFilter::Id(id)
            } else if let Some(room) = filters.eq_ulid("room_id")? {
                BookingFilter::Room(room)
            } else if let Some(guest) = filters.eq_ulid("guest_id")? {
                BookingFilter::Guest(guest)
            } else {
                BookingFilter::All
            };
            Ok(Command::SelectBookings { filter })
        }
        "payments" => Ok(Command::SelectPayments {
            booking_id: filters
                .eq_ulid("booking_id")?
                .ok_or(SqlError::MissingFilter("booking_id"))?,
        }),
        "balance" => Ok(Command::SelectBalance {
            booking_id: filters
                .eq_ulid("booking_id")?
                .ok_or(SqlError::MissingFilter("booking_id"))?,
        }),
        "availability" => {
            let check_in = filters
                .get("check_in", &[ast::BinaryOperator::Eq, ast::BinaryOperator::GtEq])
                .ok_or(SqlError::MissingFilter("check_in"))?;
            let check_out = filters
                .get("check_out", &[ast::BinaryOperator::Eq, ast::BinaryOperator::LtEq])
                .ok_or(SqlError::MissingFilter("check_out"))?;
            let min_capacity = filters
                .get("capacity", &[ast::BinaryOperator::GtEq, ast::BinaryOperator::Eq])
                .or_else(|| filters.get("min_capacity", &[ast::BinaryOperator::Eq]))
                .map(parse_u32)
                .transpose()?;
            Ok(Command::SelectAvailability(AvailabilityQuery {
                check_in: parse_date(check_in)?,
                check_out: parse_date(check_out)?,
                min_capacity,
            }))
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `column op value` conjuncts from a WHERE clause.
#[derive(Default)]
struct Filters<'a> {
    terms: Vec<(String, ast::BinaryOperator, &'a Expr)>,
}

impl<'a> Filters<'a> {
    fn get(&self, col: &str, ops: &[ast::BinaryOperator]) -> Option<&'a Expr> {
        self.terms
            .iter()
            .find(|(c, op, _)| c == col && ops.contains(op))
            .map(|(_, _, e)| *e)
    }

    fn eq_ulid(&self, col: &str) -> Result<Option<Ulid>, SqlError> {
        self.get(col, &[ast::BinaryOperator::Eq])
            .map(parse_ulid)
            .transpose()
    }
}

fn collect_filters<'a>(expr: &'a Expr, out: &mut Filters<'a>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_filters(inner, out),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_filters(left, out)?;
            collect_filters(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.terms.push((col, op.clone(), right.as_ref()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.clone()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_eq(selection: &Option<Expr>, col: &'static str) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter(col))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some(col) => parse_ulid(right),
        _ => Err(SqlError::MissingFilter(col)),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

/// Literal text of a string or number, with a leading minus folded in.
fn literal(expr: &Expr) -> Result<String, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(format!("-{}", literal(expr)?));
    }
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected literal, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        _ => Err(SqlError::Parse(format!("expected string, got {expr}"))),
    }
}

fn parse_text_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        parse_text(expr).map(Some)
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = literal(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let s = literal(expr)?;
    s.parse()
        .map_err(|_| SqlError::Parse(format!("{s} is not a non-negative integer")))
}

fn parse_decimal(expr: &Expr) -> Result<Decimal, SqlError> {
    let s = literal(expr)?;
    Decimal::from_str(&s).map_err(|e| SqlError::Parse(format!("bad decimal {s:?}: {e}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = literal(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_enum<T>(expr: &Expr) -> Result<T, SqlError>
where
    T: FromStr<Err = UnknownVariant>,
{
    let s = literal(expr)?;
    s.parse().map_err(|e: UnknownVariant| SqlError::Parse(e.to_string()))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(usize, usize),
    MissingColumn(&'static str),
    /// Full booking update without every required column.
    MissingFields(String),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(expected, got) => {
                write!(f, "expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFields(cols) => write!(f, "missing required fields: {cols}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
