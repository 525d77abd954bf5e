// Command-line entry point for callflow.

use anyhow::{Context, Result};
use callflow::api::dto::QueryRequest;
use callflow::api::server::Server;
use callflow::application::QueryUsecase;
use callflow::infrastructure::{concurrency, AutoCallGraphBuilder};
use callflow::QueryError;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "callflow", author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging, including every query stage
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query a call graph and print it as a flow diagram
    Graph(GraphArgs),
    /// Serve queries as line-delimited JSON over TCP
    Serve {
        #[arg(short, long, default_value_t = 7878)]
        port: u16,
    },
}

#[derive(Args, Debug, Default)]
struct GraphArgs {
    /// Cargo.toml, crate directory, .rs file, or graph document (import)
    module_args: Vec<String>,

    /// Directory module arguments are relative to
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Call graph algorithm (static, cha, rta, import)
    #[arg(long)]
    algo: Option<String>,

    /// Start symbol; switches to directional traversal
    #[arg(short, long)]
    symbol: Option<String>,

    /// downstream, upstream or both
    #[arg(long)]
    direction: Option<String>,

    /// Grouping keys (pkg, type)
    #[arg(long, value_delimiter = ',')]
    group: Option<Vec<String>>,

    /// Keep standard library calls
    #[arg(long)]
    keep_std: bool,

    /// Keep calls to and from private functions
    #[arg(long)]
    keep_unexported: bool,

    /// Module path prefixes to include
    #[arg(long, value_delimiter = ',')]
    limit_prefix: Vec<String>,

    /// Module path keywords to include
    #[arg(long, value_delimiter = ',')]
    limit_keyword: Vec<String>,

    /// Module path keywords to drop
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Module to focus on
    #[arg(long)]
    focus: Option<String>,

    /// Hop bound, 0 for none
    #[arg(long)]
    max_depth: Option<u32>,

    /// Include test code
    #[arg(long)]
    tests: bool,

    /// Enabled cargo features
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Output format (mermaid, dot, json)
    #[arg(short, long)]
    format: Option<String>,

    /// both or either
    #[arg(long)]
    endpoint_match: Option<String>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write the diagram here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with default query settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl GraphArgs {
    /// Config file first, then flags on top.
    fn into_request(self, debug: bool) -> Result<QueryRequest> {
        let mut req = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => QueryRequest::default(),
        };

        if !self.module_args.is_empty() {
            req.module_args = self.module_args;
        }
        if self.dir.is_some() {
            req.dir = self.dir;
        }
        if let Some(algo) = self.algo {
            req.algo = algo;
        }
        if self.symbol.is_some() {
            req.symbol = self.symbol;
        }
        if let Some(direction) = self.direction {
            req.direction = direction;
        }
        if let Some(group) = self.group {
            req.group = group;
        }
        if self.keep_std {
            req.exclude_std = false;
        }
        if self.keep_unexported {
            req.exclude_unexported = false;
        }
        if !self.limit_prefix.is_empty() {
            req.limit_prefix = self.limit_prefix;
        }
        if !self.limit_keyword.is_empty() {
            req.limit_keyword = self.limit_keyword;
        }
        if !self.ignore.is_empty() {
            req.ignore = self.ignore;
        }
        if self.focus.is_some() {
            req.focus = self.focus;
        }
        if self.max_depth.is_some() {
            req.max_depth = self.max_depth;
        }
        req.tests |= self.tests;
        if !self.tags.is_empty() {
            req.tags = self.tags;
        }
        if let Some(format) = self.format {
            req.format = format;
        }
        if let Some(endpoint_match) = self.endpoint_match {
            req.endpoint_match = endpoint_match;
        }
        if self.timeout_ms.is_some() {
            req.timeout_ms = self.timeout_ms;
        }
        req.debug |= debug;
        Ok(req)
    }
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn run_graph(args: GraphArgs, debug: bool) -> Result<()> {
    let output = args.output.clone();
    let request = args.into_request(debug)?;
    let usecase = QueryUsecase::new(&AutoCallGraphBuilder);
    let response = usecase.run(&request)?;

    match output {
        Some(path) => {
            fs::write(&path, &response.body).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Output written to {} (format: {})", path.display(), response.format);
        }
        None => print!("{}", response.body),
    }
    eprintln!(
        "nodes: {}, edges: {}, took: {} ms",
        response.stats.node_count, response.stats.edge_count, response.stats.duration_ms
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);
    if let Err(e) = concurrency::init_thread_pool() {
        log::warn!("thread pool: {}", e);
    }

    let result = match cli.command {
        Command::Graph(args) => run_graph(args, cli.debug),
        Command::Serve { port } => Server::bind(port).and_then(|server| server.run()),
    };

    if let Err(e) = result {
        match e.downcast_ref::<QueryError>() {
            Some(query_error) => eprintln!("error[{}]: {}", query_error.kind(), query_error),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}
