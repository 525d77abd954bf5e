use callflow::api::server::Server;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;

fn send(stream: &mut TcpStream, reader: &mut BufReader<TcpStream>, command: Value) -> Value {
    stream.write_all(command.to_string().as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    serde_json::from_str(&line).unwrap()
}

#[test]
fn test_server_lifecycle() {
    let server = Server::bind(0).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.run());

    let mut stream = TcpStream::connect(addr).expect("Failed to connect to server");
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let pong = send(&mut stream, &mut reader, json!({"command": "PING"}));
    assert_eq!(pong, json!({"status": "success", "data": "PONG"}));

    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let graph = send(
        &mut stream,
        &mut reader,
        json!({
            "command": "CALLGRAPH",
            "params": {
                "module_args": ["simple"],
                "dir": fixtures,
                "symbol": "main",
                "exclude_unexported": false
            }
        }),
    );
    assert_eq!(graph["status"], "success", "unexpected response {graph}");
    assert_eq!(graph["data"]["format"], "mermaid");
    assert_eq!(graph["data"]["stats"]["edge_count"], 4);
    assert!(graph["data"]["body"].as_str().unwrap().starts_with("flowchart LR"));

    let missing = send(
        &mut stream,
        &mut reader,
        json!({"command": "CALLGRAPH", "params": {"module_args": ["simple"], "dir": fixtures, "symbol": "nowhere"}}),
    );
    assert_eq!(missing["status"], "error");
    assert_eq!(missing["kind"], "symbol_not_found");

    let bad_path = send(
        &mut stream,
        &mut reader,
        json!({"command": "CALLGRAPH", "params": {"module_args": ["/invalid/path/test"]}}),
    );
    assert_eq!(bad_path["kind"], "collaborator_failure");

    let bye = send(&mut stream, &mut reader, json!({"command": "SHUTDOWN"}));
    assert_eq!(bye["status"], "success");

    handle.join().unwrap().unwrap();
}
