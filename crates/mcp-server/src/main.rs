//! learnkit-mcp: serves learnkit challenges, progress and reviews as MCP
//! tools over stdio.
//!
//! Requests are handled one at a time, each running to completion before
//! the next is read. Logs go to stderr; stdout carries only protocol frames.

mod render;

use anyhow::{Context, Result};
use learnkit::{
    ChallengeStatus, ChallengeType, Difficulty, LearnError, LearningStore, Performance,
};
use serde_json::{json, Value as JsonValue};
use std::env;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MAX_MESSAGE_BYTES: usize = 1_048_576; // 1 MiB
const MAX_TOPIC_BYTES: usize = 512;
const MAX_TEXT_BYTES: usize = 32 * 1024; // 32 KiB
const DEFAULT_STATS_DAYS: u32 = 30;
const DEFAULT_LOG_FILTER: &str = "learnkit=info,learnkit_mcp=info";

struct AppState {
    store: LearningStore,
}

impl AppState {
    fn open() -> Result<Self> {
        let data_path = data_path();
        let store = LearningStore::open(&data_path)?;
        info!(path = %data_path.display(), "learnkit data directory ready");
        Ok(Self { store })
    }
}

fn data_path() -> PathBuf {
    env::var("LEARNKIT_DATA_PATH")
        .or_else(|_| env::var("DATA_PATH"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let mut state = AppState::open().context("failed to open learnkit data directory")?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&mut state, &mut BufReader::new(stdin.lock()), &mut stdout.lock())?;
    info!("stdin closed, shutting down");
    Ok(())
}

/// Answer requests from `reader` until it reaches EOF.
fn serve<R: BufRead, W: Write>(state: &mut AppState, reader: &mut R, writer: &mut W) -> Result<()> {
    // Parse errors are answered in the framing the client last used.
    let mut last_framing = Framing::ContentLength;

    loop {
        let maybe = match read_message(reader) {
            Ok(m) => m,
            Err(e) => {
                // Malformed framing should not kill the server: reply with a
                // JSON-RPC parse error (-32700) and keep reading.
                warn!("dropping malformed message: {e:#}");
                let err_resp = json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": format!("Parse error: {e}") }
                });
                write_message(writer, &err_resp, last_framing)?;
                continue;
            }
        };
        let Some((request, framing)) = maybe else {
            return Ok(());
        };
        last_framing = framing;
        if let Some(response) = handle_request(state, &request) {
            write_message(writer, &response, framing)?;
        }
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// How a message was delimited on the wire. Replies reuse the request's
/// framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// `Content-Length: N` header block followed by N bytes of JSON.
    ContentLength,
    /// One JSON object per line.
    Line,
}

fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<(JsonValue, Framing)>> {
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if !in_headers {
            if trimmed.trim().is_empty() {
                continue;
            }
            if trimmed.trim_start().starts_with('{') {
                if trimmed.len() > MAX_MESSAGE_BYTES {
                    anyhow::bail!(
                        "message of {} bytes exceeds max allowed {} bytes",
                        trimmed.len(),
                        MAX_MESSAGE_BYTES
                    );
                }
                let value: JsonValue =
                    serde_json::from_str(trimmed).context("invalid JSON payload")?;
                return Ok(Some((value, Framing::Line)));
            }
            if !trimmed.contains(':') {
                anyhow::bail!("expected a header or a JSON object, got {trimmed:?}");
            }
            in_headers = true;
        }
        if trimmed.is_empty() {
            break;
        }

        if let Some((name, value)) = trimmed.split_once(':') {
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = Some(
                    value
                        .trim()
                        .parse::<usize>()
                        .context("invalid Content-Length")?,
                );
            }
        }
    }

    let len = content_length.context("missing Content-Length header")?;
    if len > MAX_MESSAGE_BYTES {
        anyhow::bail!(
            "Content-Length {} exceeds max allowed {} bytes",
            len,
            MAX_MESSAGE_BYTES
        );
    }
    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    let value: JsonValue = serde_json::from_slice(&payload).context("invalid JSON payload")?;
    Ok(Some((value, Framing::ContentLength)))
}

fn write_message<W: Write>(writer: &mut W, value: &JsonValue, framing: Framing) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    match framing {
        Framing::ContentLength => {
            write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
            writer.write_all(&payload)?;
        }
        Framing::Line => {
            writer.write_all(&payload)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

fn handle_request(state: &mut AppState, req: &JsonValue) -> Option<JsonValue> {
    let id = req.get("id").cloned();
    let method = req.get("method").and_then(JsonValue::as_str)?;

    match method {
        "initialize" => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "learnkit-mcp", "version": env!("CARGO_PKG_VERSION") }
                }
            })
        }),
        "notifications/initialized" => None,
        "tools/list" => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "result": {
                    "tools": tools_schema()
                }
            })
        }),
        "tools/call" => id.map(|id_val| {
            let result = call_tool(state, req.get("params"));
            match result {
                Ok(tool_result) => json!({
                    "jsonrpc": "2.0",
                    "id": id_val,
                    "result": tool_result
                }),
                Err(err) => {
                    warn!("tool call failed: {err:#}");
                    json!({
                        "jsonrpc": "2.0",
                        "id": id_val,
                        "result": {
                            "content": [{ "type": "text", "text": format!("tool error: {err}") }],
                            "isError": true
                        }
                    })
                }
            }
        }),
        "ping" => id.map(|id_val| json!({ "jsonrpc": "2.0", "id": id_val, "result": {} })),
        _ => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "error": {
                    "code": -32601,
                    "message": format!("method not found: {method}")
                }
            })
        }),
    }
}

fn tools_schema() -> Vec<JsonValue> {
    let difficulties: Vec<&str> = Difficulty::ALL.iter().map(|d| d.as_str()).collect();
    let kinds: Vec<&str> = ChallengeType::ALL.iter().map(|t| t.as_str()).collect();
    let statuses: Vec<&str> = ChallengeStatus::ALL.iter().map(|s| s.as_str()).collect();
    let performances: Vec<&str> = Performance::ALL.iter().map(|p| p.as_str()).collect();

    vec![
        json!({
            "name": "create_challenge",
            "description": "Create a learning challenge for a specific topic.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Topic for the challenge (e.g. 'Docker Networking')"},
                    "difficulty": {"type": "string", "enum": difficulties},
                    "challenge_type": {
                        "type": "string",
                        "enum": kinds,
                        "description": "knowledge (research), practical (build), teaching (explain), analysis (compare), creative (design)"
                    },
                    "description": {"type": "string", "description": "Optional custom description"}
                },
                "required": ["topic", "difficulty", "challenge_type"]
            }
        }),
        json!({
            "name": "list_challenges",
            "description": "List challenges, optionally filtered by status or difficulty.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": statuses},
                    "difficulty": {"type": "string", "enum": difficulties}
                }
            }
        }),
        json!({
            "name": "get_challenge",
            "description": "Get detailed information about a challenge.",
            "inputSchema": {
                "type": "object",
                "properties": { "challenge_id": {"type": "string"} },
                "required": ["challenge_id"]
            }
        }),
        json!({
            "name": "update_challenge_status",
            "description": "Update the status of a challenge.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "challenge_id": {"type": "string"},
                    "status": {"type": "string", "enum": statuses},
                    "notes": {"type": "string"}
                },
                "required": ["challenge_id", "status"]
            }
        }),
        json!({
            "name": "record_progress",
            "description": "Record learning progress for a topic or challenge.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "activity": {"type": "string", "description": "What was done (e.g. 'Completed tutorial')"},
                    "duration_minutes": {"type": "number", "minimum": 0},
                    "mastery_rating": {"type": "number", "minimum": 0, "maximum": 10},
                    "challenge_id": {"type": "string"},
                    "notes": {"type": "string"}
                },
                "required": ["topic", "activity", "duration_minutes", "mastery_rating"]
            }
        }),
        json!({
            "name": "get_progress_stats",
            "description": "Get learning progress statistics.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Optional topic filter"},
                    "days": {"type": "integer", "minimum": 1, "description": "Days to look back (default: 30)"}
                }
            }
        }),
        json!({
            "name": "schedule_review",
            "description": "Schedule a spaced repetition review for a topic.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "note_path": {"type": "string", "description": "Path to the note being reviewed"},
                    "initial_interval_days": {"type": "number", "exclusiveMinimum": 0, "description": "Initial interval in days (default: 1)"}
                },
                "required": ["topic", "note_path"]
            }
        }),
        json!({
            "name": "get_due_reviews",
            "description": "Get all reviews that are due now or overdue.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "complete_review",
            "description": "Mark a review as completed and schedule the next one based on performance.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "review_id": {"type": "string"},
                    "performance": {"type": "string", "enum": performances},
                    "notes": {"type": "string"}
                },
                "required": ["review_id", "performance"]
            }
        }),
        json!({
            "name": "suggest_next_topic",
            "description": "Suggest what to study next based on progress and pending challenges.",
            "inputSchema": {
                "type": "object",
                "properties": { "area": {"type": "string"} }
            }
        }),
        json!({
            "name": "analyze_knowledge_gaps",
            "description": "Identify topics with low mastery or no recent activity.",
            "inputSchema": {
                "type": "object",
                "properties": { "focus_area": {"type": "string"} }
            }
        }),
    ]
}

// ---------------------------------------------------------------------------
// Argument extraction
// ---------------------------------------------------------------------------

fn required_str<'a>(args: &'a JsonValue, key: &str) -> Result<&'a str> {
    Ok(args
        .get(key)
        .and_then(JsonValue::as_str)
        .with_context(|| format!("{key} is required"))?)
}

fn optional_str<'a>(args: &'a JsonValue, key: &str) -> Option<&'a str> {
    args.get(key).and_then(JsonValue::as_str)
}

fn required_f64(args: &JsonValue, key: &str) -> Result<f64> {
    Ok(args
        .get(key)
        .and_then(JsonValue::as_f64)
        .with_context(|| format!("{key} is required and must be a number"))?)
}

fn required_enum<T>(args: &JsonValue, key: &str) -> Result<T>
where
    T: FromStr<Err = LearnError>,
{
    Ok(required_str(args, key)?.parse::<T>()?)
}

fn optional_enum<T>(args: &JsonValue, key: &str) -> Result<Option<T>>
where
    T: FromStr<Err = LearnError>,
{
    Ok(optional_str(args, key).map(str::parse::<T>).transpose()?)
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    if let Some(v) = value {
        if v.len() > max {
            anyhow::bail!("{field} exceeds max allowed size ({max} bytes)");
        }
    }
    Ok(())
}

fn tool_result(text: String, structured: JsonValue) -> JsonValue {
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured
    })
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

fn call_tool(state: &mut AppState, params: Option<&JsonValue>) -> Result<JsonValue> {
    let name = params
        .and_then(|v| v.get("name"))
        .and_then(JsonValue::as_str)
        .context("missing tool name")?;
    let args = params
        .and_then(|v| v.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));
    let store = &state.store;

    match name {
        "create_challenge" => {
            let topic = required_str(&args, "topic")?;
            let difficulty: Difficulty = required_enum(&args, "difficulty")?;
            let challenge_type: ChallengeType = required_enum(&args, "challenge_type")?;
            let description = optional_str(&args, "description");
            check_len("topic", Some(topic), MAX_TOPIC_BYTES)?;
            check_len("description", description, MAX_TEXT_BYTES)?;

            let challenge = store.create_challenge(topic, difficulty, challenge_type, description)?;
            Ok(tool_result(
                render::challenge_created(&challenge),
                json!({ "challenge": challenge }),
            ))
        }
        "list_challenges" => {
            let status: Option<ChallengeStatus> = optional_enum(&args, "status")?;
            let difficulty: Option<Difficulty> = optional_enum(&args, "difficulty")?;
            let challenges = store.list_challenges(status, difficulty)?;
            Ok(tool_result(
                render::challenge_list(&challenges, status, difficulty),
                json!({ "challenges": challenges }),
            ))
        }
        "get_challenge" => {
            let challenge_id = required_str(&args, "challenge_id")?;
            let challenge = store.challenge(challenge_id)?;
            Ok(tool_result(
                render::challenge_detail(&challenge),
                json!({ "challenge": challenge }),
            ))
        }
        "update_challenge_status" => {
            let challenge_id = required_str(&args, "challenge_id")?;
            let status: ChallengeStatus = required_enum(&args, "status")?;
            let notes = optional_str(&args, "notes");
            check_len("notes", notes, MAX_TEXT_BYTES)?;
            let challenge = store.update_challenge_status(challenge_id, status, notes)?;
            Ok(tool_result(
                render::status_updated(&challenge),
                json!({ "challenge": challenge }),
            ))
        }
        "record_progress" => {
            let topic = required_str(&args, "topic")?;
            let activity = required_str(&args, "activity")?;
            let duration_minutes = required_f64(&args, "duration_minutes")?;
            let mastery_rating = required_f64(&args, "mastery_rating")?;
            let challenge_id = optional_str(&args, "challenge_id");
            let notes = optional_str(&args, "notes");
            check_len("topic", Some(topic), MAX_TOPIC_BYTES)?;
            check_len("activity", Some(activity), MAX_TEXT_BYTES)?;
            check_len("notes", notes, MAX_TEXT_BYTES)?;

            let entry = store.record_progress(
                topic,
                activity,
                duration_minutes,
                mastery_rating,
                challenge_id,
                notes,
            )?;
            Ok(tool_result(
                render::progress_recorded(&entry),
                json!({ "entry": entry }),
            ))
        }
        "get_progress_stats" => {
            let topic = optional_str(&args, "topic");
            let days = match args.get("days") {
                None | Some(JsonValue::Null) => DEFAULT_STATS_DAYS,
                Some(v) => v
                    .as_u64()
                    .and_then(|d| u32::try_from(d).ok())
                    .context("days must be a positive integer")?,
            };
            let stats = store.progress_stats(topic, days)?;
            Ok(tool_result(
                render::progress_stats(&stats),
                json!({ "stats": stats }),
            ))
        }
        "schedule_review" => {
            let topic = required_str(&args, "topic")?;
            let note_path = required_str(&args, "note_path")?;
            let initial_interval_days = match args.get("initial_interval_days") {
                None | Some(JsonValue::Null) => 1.0,
                Some(v) => v
                    .as_f64()
                    .context("initial_interval_days must be a number")?,
            };
            check_len("topic", Some(topic), MAX_TOPIC_BYTES)?;
            check_len("note_path", Some(note_path), MAX_TEXT_BYTES)?;

            let review = store.schedule_review(topic, note_path, initial_interval_days)?;
            Ok(tool_result(
                render::review_scheduled(&review),
                json!({ "review": review }),
            ))
        }
        "get_due_reviews" => {
            let now = store.now();
            let due = store.due_reviews(now)?;
            Ok(tool_result(
                render::due_reviews(&due, now),
                json!({ "reviews": due }),
            ))
        }
        "complete_review" => {
            let review_id = required_str(&args, "review_id")?;
            let performance: Performance = required_enum(&args, "performance")?;
            let notes = optional_str(&args, "notes");
            check_len("notes", notes, MAX_TEXT_BYTES)?;

            let review = store.complete_review(review_id, performance, notes)?;
            Ok(tool_result(
                render::review_completed(&review),
                json!({
                    "review": review,
                    "next_review_at": review.next_review_at,
                    "interval_days": review.interval_days
                }),
            ))
        }
        "suggest_next_topic" => {
            let area = optional_str(&args, "area");
            let suggestions = store.suggest_next_topic(area)?;
            Ok(tool_result(
                render::suggestions(&suggestions),
                json!({ "suggestions": suggestions }),
            ))
        }
        "analyze_knowledge_gaps" => {
            let focus_area = optional_str(&args, "focus_area");
            let ledger_empty = store.progress_entries()?.is_empty();
            let gaps = store.analyze_knowledge_gaps(focus_area)?;
            Ok(tool_result(
                render::knowledge_gaps(&gaps, ledger_empty),
                json!({ "gaps": gaps }),
            ))
        }
        _ => anyhow::bail!("unknown tool: {name}"),
    }
}
