use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{AuthSource, DefaultServerParameterProvider, LoginInfo, Password, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::NotificationResponse;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, warn};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::notify::ViewKey;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, BookingFilter, Command, SqlError};

static NEXT_PID: AtomicI32 = AtomicI32::new(1);

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = InnkeepFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Auth ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepAuthSource {
    password: String,
}

impl InnkeepAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for InnkeepAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        debug!(user = ?login.user(), "password login");
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

// ── Session ──────────────────────────────────────────────────────

/// LISTEN state of one connection.
struct Session {
    pid: i32,
    listening: HashMap<ViewKey, broadcast::Receiver<Event>>,
}

impl Session {
    /// Everything that arrived on the subscribed channels since the last drain.
    fn drain(&mut self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, rx) in self.listening.iter_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(payload) => out.push((key.channel_name(), payload)),
                        Err(e) => error!("notification encode failed: {e}"),
                    },
                    Err(TryRecvError::Lagged(n)) => {
                        warn!(channel = %key, skipped = n, "listener lagged, notifications dropped");
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        out
    }
}

pub struct InnkeepHandler {
    engine: Arc<Engine>,
    query_parser: Arc<InnkeepQueryParser>,
    session: Mutex<Session>,
}

impl InnkeepHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(InnkeepQueryParser),
            session: Mutex::new(Session {
                pid: NEXT_PID.fetch_add(1, Ordering::Relaxed),
                listening: HashMap::new(),
            }),
        }
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Push pending notifications to the client ahead of the statement's results.
    async fn flush_notifications<C>(&self, client: &mut C) -> PgWireResult<()>
    where
        C: Sink<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let (pid, pending) = self.with_session(|s| (s.pid, s.drain()));
        for (channel, payload) in pending {
            client
                .send(PgWireBackendMessage::NotificationResponse(
                    NotificationResponse::new(pid, channel, payload),
                ))
                .await?;
        }
        Ok(())
    }

    /// Run every statement of a query string, then flush notifications.
    /// Execution stops at the first failing statement.
    async fn run<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: Sink<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let statements = sql::split_statements(query);
        let mut responses = Vec::with_capacity(statements.len());
        let mut failure = None;
        for statement in statements {
            match self.run_statement(statement).await {
                Ok(mut r) => responses.append(&mut r),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.flush_notifications(client).await?;
        match failure {
            None if responses.is_empty() => Ok(vec![Response::EmptyQuery]),
            None => Ok(responses),
            Some(e) if responses.is_empty() => Err(e),
            Some(PgWireError::UserError(info)) => {
                responses.push(Response::Error(info));
                Ok(responses)
            }
            Some(e) => Err(e),
        }
    }

    /// Parse, execute and record one statement.
    async fn run_statement(&self, statement: &str) -> PgWireResult<Vec<Response>> {
        let cmd = match sql::parse_sql(statement) {
            Ok(cmd) => cmd,
            Err(e) => {
                metrics::counter!(QUERIES_TOTAL, "command" => "unparsed", "status" => "error")
                    .increment(1);
                return Err(sql_err(e));
            }
        };
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertRoom(req) => {
                engine.create_room(req).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateRoomStatus { id, status } => {
                engine.set_room_status(id, status).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertBooking(req) => {
                engine.create_booking(req).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SetBookingStatus { id, status } => {
                let result = match status {
                    BookingStatus::Confirmed => engine.confirm_booking(id).await,
                    BookingStatus::Cancelled => engine.cancel_booking(id).await,
                    BookingStatus::CheckedIn => engine.check_in(id).await,
                    BookingStatus::CheckedOut => engine.check_out(id).await,
                    BookingStatus::Pending => engine.set_booking_status(id, status).await,
                };
                result.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::UpdateBooking { id, update } => {
                engine.update_booking(id, update).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::CancelBooking { id } => {
                engine.cancel_booking(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertPayment(req) => {
                engine.add_payment(req).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SettlePayment { id, status } => {
                engine.settle_payment(id, status).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectRooms { id } => {
                let rooms = match id {
                    Some(id) => match engine.get_room(id).await {
                        Ok(room) => vec![room],
                        Err(EngineError::NotFound(_)) => vec![],
                        Err(e) => return Err(engine_err(e)),
                    },
                    None => engine.list_rooms().await,
                };
                Ok(vec![room_rows(&rooms)])
            }
            Command::SelectBookings { filter } => {
                let bookings = match filter {
                    BookingFilter::All => engine.list_bookings().await,
                    BookingFilter::Id(id) => match engine.get_booking(id).await {
                        Ok(b) => vec![b],
                        Err(EngineError::NotFound(_)) => vec![],
                        Err(e) => return Err(engine_err(e)),
                    },
                    BookingFilter::Room(room_id) => engine
                        .bookings_for_room(room_id)
                        .await
                        .map_err(engine_err)?,
                    BookingFilter::Guest(guest_id) => engine.bookings_for_guest(guest_id).await,
                };
                Ok(vec![booking_rows(&bookings)])
            }
            Command::SelectPayments { booking_id } => {
                let payments = engine
                    .payments_for_booking(booking_id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![payment_rows(&payments)])
            }
            Command::SelectAvailability(query) => {
                let rooms = engine
                    .find_available_rooms(&query)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![room_rows(&rooms)])
            }
            Command::SelectBalance { booking_id } => {
                let balance = engine
                    .booking_balance(booking_id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![balance_rows(booking_id, &balance)])
            }
            Command::Listen { channel } => {
                let key = channel_key(&channel)?;
                let hub = &engine.notify;
                self.with_session(|s| {
                    s.listening.entry(key).or_insert_with(|| hub.subscribe(&key));
                });
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                let key = channel_key(&channel)?;
                self.with_session(|s| s.listening.remove(&key));
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => {
                self.with_session(|s| s.listening.clear());
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
        }
    }
}

fn channel_key(channel: &str) -> PgWireResult<ViewKey> {
    ViewKey::parse(channel).ok_or_else(|| {
        user_error(
            "22023",
            format!("invalid channel: {channel} (expected bookings, rooms, booking_<id> or guest_<id>)"),
        )
    })
}

// ── Result sets ──────────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn room_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("number"),
        text_field("room_type"),
        text_field("price"),
        int_field("capacity"),
        text_field("status"),
        text_field("amenities"),
        text_field("description"),
    ]
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("room_id"),
        text_field("guest_id"),
        text_field("check_in"),
        text_field("check_out"),
        int_field("guests"),
        text_field("status"),
        text_field("total_price"),
        int_field("created_at"),
    ]
}

fn payment_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("booking_id"),
        text_field("amount"),
        text_field("method"),
        text_field("status"),
        int_field("created_at"),
    ]
}

fn balance_schema() -> Vec<FieldInfo> {
    vec![
        text_field("booking_id"),
        text_field("total_price"),
        text_field("total_paid"),
        text_field("total_refunded"),
        text_field("remaining"),
    ]
}

fn room_rows(rooms: &[Room]) -> Response {
    let schema = Arc::new(room_schema());
    let rows: Vec<PgWireResult<_>> = rooms
        .iter()
        .map(|room| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&room.id.to_string())?;
            encoder.encode_field(&room.number)?;
            encoder.encode_field(&room.room_type)?;
            encoder.encode_field(&room.price.to_string())?;
            encoder.encode_field(&i64::from(room.capacity))?;
            encoder.encode_field(&room.status.to_string())?;
            encoder.encode_field(&room.amenities.join(","))?;
            encoder.encode_field(&room.description)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn booking_rows(bookings: &[Booking]) -> Response {
    let schema = Arc::new(booking_schema());
    let rows: Vec<PgWireResult<_>> = bookings
        .iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.room_id.to_string())?;
            encoder.encode_field(&b.guest_id.to_string())?;
            encoder.encode_field(&b.stay.check_in.to_string())?;
            encoder.encode_field(&b.stay.check_out.to_string())?;
            encoder.encode_field(&i64::from(b.guests))?;
            encoder.encode_field(&b.status.to_string())?;
            encoder.encode_field(&b.total_price.to_string())?;
            encoder.encode_field(&b.created_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn payment_rows(payments: &[Payment]) -> Response {
    let schema = Arc::new(payment_schema());
    let rows: Vec<PgWireResult<_>> = payments
        .iter()
        .map(|p| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&p.id.to_string())?;
            encoder.encode_field(&p.booking_id.to_string())?;
            encoder.encode_field(&p.amount.to_string())?;
            encoder.encode_field(&p.method.to_string())?;
            encoder.encode_field(&p.status.to_string())?;
            encoder.encode_field(&p.created_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn balance_rows(booking_id: Ulid, balance: &Balance) -> Response {
    let schema = Arc::new(balance_schema());
    let rows: Vec<PgWireResult<_>> = [balance]
        .into_iter()
        .map(|balance| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&booking_id.to_string())?;
            encoder.encode_field(&balance.total_price.to_string())?;
            encoder.encode_field(&balance.total_paid.to_string())?;
            encoder.encode_field(&balance.total_refunded.to_string())?;
            encoder.encode_field(&balance.remaining.to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Column layout a statement will return, from its target table.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    if !lower.trim_start().starts_with("select") {
        return vec![];
    }
    let table = lower
        .split_whitespace()
        .skip_while(|w| *w != "from")
        .nth(1)
        .map(|t| t.trim_matches(|c: char| c == '"' || c == ';'))
        .unwrap_or_default();
    match table {
        "rooms" | "availability" => room_schema(),
        "bookings" => booking_schema(),
        "payments" => payment_schema(),
        "balance" => balance_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for InnkeepHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(client, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepQueryParser;

#[async_trait]
impl QueryParser for InnkeepQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for InnkeepHandler {
    type Statement = String;
    type QueryParser = InnkeepQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(client, &sql).await?;
        if responses.is_empty() {
            return Ok(Response::EmptyQuery);
        }
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_text_params(&portal.statement.statement, &portal.parameters)
}

/// One pass over `sql`: every `$N` outside a quoted literal becomes the
/// quoted value of parameter N. Substituted text is never rescanned, so a
/// value can't reintroduce placeholders or close its own quotes.
fn bind_text_params(sql: &str, params: &[Option<Bytes>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '$' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = j + 1;
                    chars.next();
                }
                let bound = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                match bound {
                    Some(Some(bytes)) => {
                        out.push('\'');
                        out.push_str(&String::from_utf8_lossy(bytes).replace('\'', "''"));
                        out.push('\'');
                    }
                    Some(None) => out.push_str("NULL"),
                    None => out.push_str(&sql[i..end]),
                }
            }
            None => out.push(c),
        }
    }
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct InnkeepFactory {
    handler: Arc<InnkeepHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<InnkeepAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl InnkeepFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        Self {
            handler: Arc::new(InnkeepHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                InnkeepAuthSource::new(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for InnkeepFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

/// SQLSTATE for an engine error.
fn engine_sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::InvalidRange { .. }
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidGuestCount(_)
        | EngineError::LimitExceeded(_) => "22023",
        EngineError::NotFound(_) => "P0002",
        EngineError::RoomUnavailable(_) => "23P01",
        EngineError::AlreadyExists(_) | EngineError::DuplicateRoomNumber(_) => "23505",
        EngineError::InvalidTransition { .. }
        | EngineError::OverPayment { .. }
        | EngineError::CapacityExceeded(_)
        | EngineError::HasBookings(_) => "P0001",
        EngineError::WalError(_) => "58030",
    }
}

/// Code and client-facing message. Storage details stay in the log.
fn engine_error_parts(e: &EngineError) -> (&'static str, String) {
    if e.is_internal() {
        error!("storage failure: {e}");
        return (engine_sqlstate(e), "internal error".into());
    }
    (engine_sqlstate(e), e.to_string())
}

fn engine_err(e: EngineError) -> PgWireError {
    let (code, message) = engine_error_parts(&e);
    user_error(code, message)
}

fn sql_sqlstate(e: &SqlError) -> &'static str {
    match e {
        SqlError::MissingFields(_) => "23502",
        _ => "42601",
    }
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error(sql_sqlstate(&e), e.to_string())
}
