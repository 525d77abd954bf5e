use crate::api::dto::{ErrorResponse, QueryRequest};
use crate::application::QueryUsecase;
use crate::domain::context::Interrupt;
use crate::infrastructure::AutoCallGraphBuilder;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Deserialize)]
struct CommandReq {
    command: String,
    params: Option<Value>,
}

/// Line-delimited JSON command server. One thread per connection; each
/// query builds its own graph.
pub struct Server {
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn bind(port: u16) -> Result<Self> {
        let address = format!("127.0.0.1:{}", port);
        let listener = TcpListener::bind(&address).with_context(|| format!("Failed to bind to {}", address))?;
        Ok(Self {
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until a client sends `SHUTDOWN`.
    pub fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        log::info!("listening on {}", addr);

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let shutdown = Arc::clone(&self.shutdown);
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &shutdown, addr) {
                            log::warn!("connection error: {:#}", e);
                        }
                    });
                }
                Err(e) => log::warn!("accept error: {}", e),
            }
        }
        log::info!("server stopped");
        Ok(())
    }
}

fn handle_connection(mut stream: TcpStream, shutdown: &Arc<AtomicBool>, addr: SocketAddr) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (response, stop) = process_command(trimmed, shutdown);
        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        if stop {
            shutdown.store(true, Ordering::SeqCst);
            // wake the accept loop so it sees the flag
            let _ = TcpStream::connect(addr);
            break;
        }
    }
    Ok(())
}

fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

fn failure(message: impl std::fmt::Display) -> Value {
    json!({ "status": "error", "message": message.to_string() })
}

/// Response for one command line, and whether the server should stop.
fn process_command(json_str: &str, shutdown: &Arc<AtomicBool>) -> (Value, bool) {
    let req: CommandReq = match serde_json::from_str(json_str) {
        Ok(req) => req,
        Err(e) => return (failure(format!("Invalid JSON format: {}", e)), false),
    };

    match req.command.as_str() {
        "PING" => (success(json!("PONG")), false),
        "CALLGRAPH" => (handle_callgraph(req.params, shutdown), false),
        "SHUTDOWN" => {
            log::info!("shutdown requested");
            (success(json!("Shutting down...")), true)
        }
        other => (failure(format!("Unknown command: {}", other)), false),
    }
}

fn handle_callgraph(params: Option<Value>, shutdown: &Arc<AtomicBool>) -> Value {
    let Some(params) = params else {
        return failure("Missing params for CALLGRAPH");
    };
    let request: QueryRequest = match serde_json::from_value(params) {
        Ok(request) => request,
        Err(e) => return failure(format!("Invalid CALLGRAPH params: {}", e)),
    };

    let usecase = QueryUsecase::new(&AutoCallGraphBuilder).with_interrupt(Interrupt::none().with_flag(Arc::clone(shutdown)));
    match usecase.run(&request) {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(data) => success(data),
            Err(e) => failure(e),
        },
        Err(err) => {
            log::warn!("query failed: {}", err);
            serde_json::to_value(ErrorResponse::from(&err)).unwrap_or_else(failure)
        }
    }
}
