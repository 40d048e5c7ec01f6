//! Transport-agnostic command surface.
//!
//! [`CommandSurface::handle`] serves the board REST contract over a plain
//! [`Request`]/[`Response`] pair so any HTTP stack can sit in front of it. Every
//! request is a fresh load, one logical command and a save. Sub-resources are
//! addressed by external hashes (or column slugs), never by internal ids.
//!
//! Concurrent requests against the same board are last-writer-wins: saves carry
//! no version token.

pub mod dto;

use crate::auth::AuthGate;
use crate::domain::{
    sorted_cards, Applied, Board, BoardId, BoardStore, Card, CardPatch, ColumnId, Command,
    DeleteStrategy, Effect, ExternalHash, SortField, SortOrder,
};
use crate::error::{BoardError, EntityKind, ErrorKind, Result};
use crate::events::{BoardEvent, EventKind, EventSink};
use crate::storage::{with_timeout, Storage};
use dto::{CardDto, ColumnDto, CreateCardBody, CreateColumnBody, ErrorBody, UpdateCardBody};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(BoardError::validation("method", format!("unsupported method '{}'", s))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path with optional query string, e.g. `/boards/team/cards?sort=title`
    pub path: String,
    /// Raw token or `Authorization` header value
    pub credential: Option<String>,
    /// Raw JSON body
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            credential: None,
            body: None,
        }
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(self, body: &Value) -> Self {
        self.body(body.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Option<Value>,
}

impl Response {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self {
                status,
                body: Some(body),
            },
            Err(err) => Self::error(500, err.to_string()),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &ErrorBody {
                error: message.into(),
            },
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `error` message of a failure body
    pub fn error_message(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.as_str()
    }
}

impl From<BoardError> for Response {
    fn from(err: BoardError) -> Self {
        Self::error(status_for(&err), err.to_string())
    }
}

/// HTTP status for an error
pub fn status_for(err: &BoardError) -> u16 {
    match err.kind() {
        ErrorKind::Validation => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::Conflict => match err {
            BoardError::ColumnNotEmpty { .. } => 400,
            _ => 409,
        },
        ErrorKind::Auth => 401,
        ErrorKind::Persistence => 500,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    Cards,
    Card(String),
    Columns,
    Column(String),
}

impl Resource {
    fn allows(&self, method: Method) -> bool {
        matches!(
            (self, method),
            (Self::Cards, Method::Get | Method::Post)
                | (Self::Card(_), Method::Get | Method::Put | Method::Delete)
                | (Self::Columns, Method::Get | Method::Post)
                | (Self::Column(_), Method::Delete)
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cards => write!(f, "cards"),
            Self::Card(hash) => write!(f, "card {}", hash),
            Self::Columns => write!(f, "columns"),
            Self::Column(hash) => write!(f, "column {}", hash),
        }
    }
}

#[derive(Debug)]
struct Route {
    board: BoardId,
    resource: Resource,
    query: Vec<(String, String)>,
}

fn parse_route(path: &str) -> std::result::Result<Route, Response> {
    let (path, query) = path.split_once('?').unwrap_or((path, ""));
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let (board, resource) = match segments.as_slice() {
        ["boards", board, "cards"] => (*board, Resource::Cards),
        ["boards", board, "cards", hash] => (*board, Resource::Card(hash.to_string())),
        ["boards", board, "columns"] => (*board, Resource::Columns),
        ["boards", board, "columns", hash] => (*board, Resource::Column(hash.to_string())),
        _ => return Err(Response::error(404, format!("No route for {}", path))),
    };

    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_component(key)?, decode_component(value)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Route {
        board: BoardId::from_str(board)?,
        resource,
        query,
    })
}

#[derive(Debug)]
enum Action {
    ListCards { field: SortField, order: SortOrder },
    CreateCard(CreateCardBody),
    GetCard(String),
    UpdateCard(String, UpdateCardBody),
    DeleteCard(String),
    ListColumns,
    CreateColumn(CreateColumnBody),
    DeleteColumn(String),
}

impl Action {
    fn parse(
        method: Method,
        resource: Resource,
        query: &[(String, String)],
        body: Option<&str>,
    ) -> Result<Self> {
        let action = match (method, resource) {
            (Method::Get, Resource::Cards) => {
                let mut field = SortField::default();
                let mut order = SortOrder::default();
                for (key, value) in query {
                    match key.as_str() {
                        "sort" => field = query_value("sort", value)?,
                        "order" => order = query_value("order", value)?,
                        _ => {}
                    }
                }
                Self::ListCards { field, order }
            }
            (Method::Post, Resource::Cards) => Self::CreateCard(parse_body(body)?),
            (Method::Get, Resource::Card(hash)) => Self::GetCard(hash),
            (Method::Put, Resource::Card(hash)) => Self::UpdateCard(hash, parse_body(body)?),
            (Method::Delete, Resource::Card(hash)) => Self::DeleteCard(hash),
            (Method::Get, Resource::Columns) => Self::ListColumns,
            (Method::Post, Resource::Columns) => Self::CreateColumn(parse_body(body)?),
            (Method::Delete, Resource::Column(hash)) => Self::DeleteColumn(hash),
            (method, resource) => {
                return Err(BoardError::validation(
                    "method",
                    format!("{} not supported on {}", method, resource),
                ))
            }
        };
        Ok(action)
    }
}

fn query_value<T: FromStr<Err = String>>(field: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|message| BoardError::validation(field, message))
}

/// Decodes one query component; `+` stands for a space
fn decode_component(raw: &str) -> Result<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| decoded.trim().to_string())
        .map_err(|_| BoardError::validation("query", format!("'{}' is not valid UTF-8", raw)))
}

fn parse_body<T: DeserializeOwned + Default>(body: Option<&str>) -> Result<T> {
    match body.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| BoardError::validation("body", format!("malformed JSON: {}", err))),
    }
}

/// A path hash that does not parse can never resolve
fn parse_hash(entity: EntityKind, raw: &str) -> Result<ExternalHash> {
    ExternalHash::from_str(raw).map_err(|_| BoardError::not_found(entity, raw))
}

fn find_card<'a>(board: &'a Board, hash: &ExternalHash) -> Result<&'a Card> {
    board
        .card_by_hash(hash)
        .ok_or_else(|| BoardError::not_found(EntityKind::Card, hash))
}

/// Resolves a column named in a request body. Failing to resolve is a bad request.
fn column_for_hash(board: &Board, field: &str, raw: &str) -> Result<ColumnId> {
    ExternalHash::from_str(raw)
        .ok()
        .and_then(|hash| board.column_by_hash(&hash))
        .map(|column| column.id)
        .ok_or_else(|| BoardError::validation(field, format!("unknown column '{}'", raw)))
}

fn target_column(
    board: &Board,
    hash: Option<&str>,
    name: Option<&str>,
) -> Result<Option<ColumnId>> {
    if let Some(raw) = hash {
        return column_for_hash(board, "columnHash", raw).map(Some);
    }
    if let Some(name) = name {
        return board
            .column_by_slug(name)
            .map(|column| Some(column.id))
            .ok_or_else(|| {
                BoardError::validation("columnName", format!("no column named '{}'", name))
            });
    }
    Ok(None)
}

fn inconsistent(what: &str) -> BoardError {
    BoardError::CorruptBoard(format!("{} missing after command", what))
}

/// Result of one action: the response, plus the board to save and the events to
/// publish when something changed
struct Outcome {
    response: Response,
    board: Option<Board>,
    events: Vec<EventKind>,
}

impl Outcome {
    fn read(response: Response) -> Self {
        Self {
            response,
            board: None,
            events: Vec::new(),
        }
    }

    fn changed(response: Response, board: Board, events: Vec<EventKind>) -> Self {
        Self {
            response,
            board: Some(board),
            events,
        }
    }
}

pub struct CommandSurface {
    storage: Arc<dyn Storage>,
    auth: Arc<dyn AuthGate>,
    events: Arc<dyn EventSink>,
    store: Mutex<BoardStore>,
    timeout: Duration,
}

impl CommandSurface {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(
        storage: Arc<dyn Storage>,
        auth: Arc<dyn AuthGate>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            storage,
            auth,
            events,
            store: Mutex::new(BoardStore::new()),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bounds every load and save
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_store(mut self, store: BoardStore) -> Self {
        self.store = Mutex::new(store);
        self
    }

    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method;
        let path = request.path.clone();

        let response = match self.dispatch(request).await {
            Ok(response) | Err(response) => response,
        };

        if response.status >= 500 {
            warn!(
                %method,
                path = %path,
                status = response.status,
                error = ?response.error_message(),
                "request failed"
            );
        } else {
            info!(%method, path = %path, status = response.status, "request handled");
        }
        response
    }

    async fn dispatch(&self, request: Request) -> std::result::Result<Response, Response> {
        let route = parse_route(&request.path)?;
        if !route.resource.allows(request.method) {
            return Err(Response::error(
                405,
                format!("{} not allowed on {}", request.method, route.resource),
            ));
        }
        if !self
            .auth
            .authenticate(request.credential.as_deref(), &route.board)
        {
            return Err(BoardError::Unauthorized.into());
        }

        let action = Action::parse(
            request.method,
            route.resource,
            &route.query,
            request.body.as_deref(),
        )?;

        let loaded =
            with_timeout("load", self.timeout, self.storage.load_board(&route.board)).await?;
        let backfill = self.apply(&loaded, Command::AssignMissingHashes)?;
        let backfilled = !backfill.is_unchanged();
        let board = backfill.board;

        let outcome = self.execute(&board, action)?;
        let to_save = match outcome.board {
            Some(changed) => Some(changed),
            None if backfilled => Some(board),
            None => None,
        };

        if let Some(board) = &to_save {
            with_timeout("save", self.timeout, self.storage.save_board(board)).await?;
        }
        for kind in outcome.events {
            self.events.publish(BoardEvent::new(route.board.clone(), kind));
        }

        Ok(outcome.response)
    }

    fn apply(&self, board: &Board, command: Command) -> Result<Applied> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(board, command)
    }

    fn execute(&self, board: &Board, action: Action) -> Result<Outcome> {
        match action {
            Action::ListCards { field, order } => {
                let cards: Vec<CardDto> = sorted_cards(board, field, order)
                    .into_iter()
                    .map(|card| CardDto::new(board, card))
                    .collect();
                Ok(Outcome::read(Response::json(200, &cards)))
            }
            Action::CreateCard(body) => self.create_card(board, body),
            Action::GetCard(raw) => {
                let hash = parse_hash(EntityKind::Card, &raw)?;
                let card = find_card(board, &hash)?;
                Ok(Outcome::read(Response::json(200, &CardDto::new(board, card))))
            }
            Action::UpdateCard(raw, body) => self.update_card(board, &raw, body),
            Action::DeleteCard(raw) => {
                let hash = parse_hash(EntityKind::Card, &raw)?;
                let card = find_card(board, &hash)?.id;
                let applied = self.apply(board, Command::DeleteCard { card })?;
                Ok(Outcome::changed(
                    Response::no_content(),
                    applied.board,
                    vec![EventKind::CardDeleted { card_hash: hash }],
                ))
            }
            Action::ListColumns => {
                let columns: Vec<ColumnDto> =
                    board.ordered_columns().map(ColumnDto::from).collect();
                Ok(Outcome::read(Response::json(200, &columns)))
            }
            Action::CreateColumn(body) => self.create_column(board, body),
            Action::DeleteColumn(raw) => {
                let hash = parse_hash(EntityKind::Column, &raw)?;
                let column = board
                    .column_by_hash(&hash)
                    .ok_or_else(|| BoardError::not_found(EntityKind::Column, &hash))?
                    .id;
                let applied = self.apply(
                    board,
                    Command::DeleteColumn {
                        column,
                        strategy: DeleteStrategy::RejectIfNonEmpty,
                    },
                )?;
                Ok(Outcome::changed(
                    Response::no_content(),
                    applied.board,
                    vec![EventKind::ColumnDeleted { column_hash: hash }],
                ))
            }
        }
    }

    fn create_card(&self, board: &Board, body: CreateCardBody) -> Result<Outcome> {
        let title = body
            .title
            .ok_or_else(|| BoardError::validation("title", "is required"))?;
        let requested = target_column(
            board,
            body.column_hash.as_deref(),
            body.column_name.as_deref(),
        )?;
        let column = match requested {
            Some(column) => column,
            None => board
                .column_order
                .first()
                .copied()
                .ok_or_else(|| BoardError::validation("column", "board has no columns"))?,
        };

        let applied = self.apply(
            board,
            Command::AddCard {
                column,
                title,
                description: body.description,
            },
        )?;
        let Effect::CardAdded { id, hash } = &applied.effect else {
            return Err(inconsistent("card"));
        };
        let card = applied.board.cards.get(id).ok_or_else(|| inconsistent("card"))?;
        let dto = CardDto::new(&applied.board, card);
        let events = vec![EventKind::CardCreated {
            card_hash: hash.clone(),
            column_hash: dto.column_hash.clone(),
        }];

        Ok(Outcome::changed(Response::json(201, &dto), applied.board, events))
    }

    /// Patches content, then moves the card to the end of a different target column
    fn update_card(&self, board: &Board, raw: &str, body: UpdateCardBody) -> Result<Outcome> {
        let hash = parse_hash(EntityKind::Card, raw)?;
        let card = find_card(board, &hash)?;
        let (id, from) = (card.id, card.column_id);
        let target = target_column(
            board,
            body.column_hash.as_deref(),
            body.column_name.as_deref(),
        )?;
        let patch = CardPatch {
            title: body.title,
            description: body.description,
        };

        let mut next = board.clone();
        let mut events = Vec::new();

        if !patch.is_empty() {
            let applied = self.apply(&next, Command::UpdateCard { card: id, patch })?;
            if !applied.is_unchanged() {
                events.push(EventKind::CardUpdated {
                    card_hash: hash.clone(),
                });
            }
            next = applied.board;
        }

        if let Some(to) = target.filter(|to| *to != from) {
            let index = next.card_count(to);
            next = self
                .apply(
                    &next,
                    Command::MoveCard {
                        card: id,
                        to_column: to,
                        index,
                    },
                )?
                .board;
            events.push(EventKind::CardMoved {
                card_hash: hash,
                column_hash: next.columns.get(&to).and_then(|c| c.external_hash.clone()),
            });
        }

        let card = next.cards.get(&id).ok_or_else(|| inconsistent("card"))?;
        let response = Response::json(200, &CardDto::new(&next, card));

        Ok(if events.is_empty() {
            Outcome::read(response)
        } else {
            Outcome::changed(response, next, events)
        })
    }

    fn create_column(&self, board: &Board, body: CreateColumnBody) -> Result<Outcome> {
        let title = body
            .title
            .ok_or_else(|| BoardError::validation("title", "is required"))?;
        let insert_after = body
            .insert_after
            .as_deref()
            .map(|raw| column_for_hash(board, "insertAfter", raw))
            .transpose()?;

        let applied = self.apply(board, Command::AddColumn { title, insert_after })?;
        let Effect::ColumnAdded { id, hash } = &applied.effect else {
            return Err(inconsistent("column"));
        };
        let column = applied.board.columns.get(id).ok_or_else(|| inconsistent("column"))?;
        let dto = ColumnDto::from(column);
        let events = vec![EventKind::ColumnCreated {
            column_hash: hash.clone(),
        }];

        Ok(Outcome::changed(Response::json(201, &dto), applied.board, events))
    }
}
