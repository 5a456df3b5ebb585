//! monogate binary
//!
//! Serves the built-in demo application, which renders the request
//! environment and body back as an HTML page.
//!
//! # Usage
//!
//! ```text
//! monogate --host 0.0.0.0 --port 8888 --queue-size 5 --delay 0
//! ```
//!
//! Logging is configured through `RUST_LOG` and defaults to `info`.

use std::process::ExitCode;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;

use monogate::gateway::{AppResult, Environ, StartResponse};
use monogate::server::{Config, Server};

#[derive(Parser)]
#[command(name = "monogate", about = "Minimal one-request-per-connection HTTP/1.1 server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8888)]
    port: u16,

    /// Accept backlog size.
    #[arg(short = 'q', long, default_value_t = 5)]
    queue_size: i32,

    /// Seconds each worker holds its connection open after responding, a
    /// concurrency testing hook.
    #[arg(short, long, default_value_t = 0)]
    delay: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config {
        host: cli.host,
        port: cli.port,
        backlog: cli.queue_size,
        worker_delay: Duration::from_secs(cli.delay),
    };

    let server = Server::new(config, demo_app);
    if let Err(err) = server.serve() {
        log::error!("server failed: {}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Demo application: echo the request environment and body as HTML
fn demo_app(env: Environ<'_>, response: &mut StartResponse) -> AppResult {
    let body = env.input.read(env.content_length)?;

    let page = format!(
        "<html>\n<head><title>monogate</title></head>\n<body>\n\
         <h1>{method} {path}</h1>\n\
         <ul>\n\
         <li>protocol: {protocol}</li>\n\
         <li>content type: {content_type}</li>\n\
         <li>content length: {content_length}</li>\n\
         <li>server: {host}:{port}</li>\n\
         </ul>\n\
         <pre>{body}</pre>\n\
         </body>\n</html>\n",
        method = env.method,
        path = env.path,
        protocol = env.protocol,
        content_type = env.content_type.as_deref().unwrap_or("-"),
        content_length = env.content_length,
        host = env.server_host,
        port = env.server_port,
        body = escape_html(&String::from_utf8_lossy(&body)),
    );

    response.start(
        "200 OK",
        vec![
            ("Content-Type", "text/html".to_string()),
            ("Content-Length", page.len().to_string()),
        ],
        None,
    )?;

    Ok(Box::new(std::iter::once(Bytes::from(page))))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
