use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

fn write_mcp_message(stdin: &mut impl Write, payload: &Value) {
    let body = serde_json::to_vec(payload).unwrap();
    write!(stdin, "Content-Length: {}\r\n\r\n", body.len()).unwrap();
    stdin.write_all(&body).unwrap();
    stdin.flush().unwrap();
}

fn read_mcp_message(stdout: &mut impl BufRead) -> Value {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = stdout.read_line(&mut line).unwrap();
        assert!(n > 0, "unexpected EOF");
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = Some(value.trim().parse::<usize>().unwrap());
            }
        }
    }
    let len = content_length.expect("missing Content-Length");
    let mut buf = vec![0_u8; len];
    stdout.read_exact(&mut buf).unwrap();
    serde_json::from_slice(&buf).unwrap()
}

fn spawn_server(data: &TempDir) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let bin = env!("CARGO_BIN_EXE_learnkit-mcp");
    let mut child = Command::new(bin)
        .env("LEARNKIT_DATA_PATH", data.path())
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let stdin = child.stdin.take().unwrap();
    let stdout = BufReader::new(child.stdout.take().unwrap());
    (child, stdin, stdout)
}

fn call_tool(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

#[test]
fn stdio_server_schedules_and_completes_reviews() {
    let data = tempfile::tempdir().unwrap();
    let (mut child, mut stdin, mut stdout) = spawn_server(&data);

    write_mcp_message(
        &mut stdin,
        &json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
    );
    let init = read_mcp_message(&mut stdout);
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "learnkit-mcp");

    // Notifications get no reply; the next frame read belongs to id 2.
    write_mcp_message(
        &mut stdin,
        &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    );

    write_mcp_message(
        &mut stdin,
        &call_tool(
            2,
            "schedule_review",
            json!({ "topic": "Docker Basics", "note_path": "notes/docker.md" }),
        ),
    );
    let scheduled = read_mcp_message(&mut stdout);
    assert_eq!(scheduled["id"], 2);
    let review_id = scheduled["result"]["structuredContent"]["review"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(review_id.starts_with("rv_"));

    write_mcp_message(&mut stdin, &call_tool(3, "get_due_reviews", json!({})));
    let due = read_mcp_message(&mut stdout);
    assert_eq!(due["id"], 3);
    assert_eq!(
        due["result"]["structuredContent"]["reviews"]
            .as_array()
            .unwrap()
            .len(),
        0
    );

    write_mcp_message(
        &mut stdin,
        &call_tool(
            4,
            "complete_review",
            json!({ "review_id": review_id, "performance": "perfect" }),
        ),
    );
    let completed = read_mcp_message(&mut stdout);
    assert_eq!(completed["id"], 4);
    let review = &completed["result"]["structuredContent"]["review"];
    assert_eq!(review["repetitions"], 1);
    assert_eq!(review["interval_days"], 1.0);
    assert!(review["ease_factor"].as_f64().unwrap() > 2.5);

    write_mcp_message(
        &mut stdin,
        &call_tool(
            5,
            "complete_review",
            json!({ "review_id": "rv_missing", "performance": "weak" }),
        ),
    );
    let missing = read_mcp_message(&mut stdout);
    assert_eq!(missing["result"]["isError"], true);

    write_mcp_message(
        &mut stdin,
        &json!({ "jsonrpc": "2.0", "id": 6, "method": "resources/list" }),
    );
    let unknown = read_mcp_message(&mut stdout);
    assert_eq!(unknown["error"]["code"], -32601);

    drop(stdin);
    let status = child.wait().unwrap();
    assert!(status.success());

    let saved = std::fs::read_to_string(data.path().join("reviews.json")).unwrap();
    let doc: Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(doc["reviews"][0]["id"], review_id.as_str());
    assert_eq!(doc["reviews"][0]["note_path"], "notes/docker.md");
}

#[test]
fn stdio_server_accepts_line_delimited_json() {
    let data = tempfile::tempdir().unwrap();
    let (mut child, mut stdin, mut stdout) = spawn_server(&data);

    writeln!(stdin, r#"{{"jsonrpc":"2.0","id":1,"method":"ping"}}"#).unwrap();
    writeln!(stdin, "not json at all").unwrap();
    stdin.flush().unwrap();

    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    let pong: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(pong["id"], 1);
    assert!(pong["result"].is_object());

    // Garbage is answered with a line-framed parse error and the server
    // keeps going.
    line.clear();
    stdout.read_line(&mut line).unwrap();
    let parse_error: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(parse_error["error"]["code"], -32700);

    writeln!(
        stdin,
        "{}",
        call_tool(
            2,
            "create_challenge",
            json!({ "topic": "Rust Lifetimes", "difficulty": "advanced", "challenge_type": "teaching" })
        )
    )
    .unwrap();
    stdin.flush().unwrap();
    line.clear();
    stdout.read_line(&mut line).unwrap();
    let created: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(created["id"], 2);
    assert_eq!(
        created["result"]["structuredContent"]["challenge"]["type"],
        "teaching"
    );

    drop(stdin);
    assert!(child.wait().unwrap().success());
    assert!(data.path().join("challenges.json").exists());
}
