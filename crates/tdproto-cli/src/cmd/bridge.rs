//! `tdproto bridge`
//!
//! Spawns a process that speaks TDLib JSON, one object per line, on its
//! stdin and stdout. Requests typed on our stdin go through the client;
//! replies and updates are printed to stdout as JSON lines.

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::json;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tdproto_client::{ChannelError, ChannelTransport, Client, ClientError, Inbound, Reply, Updates};
use tdproto_core::{Catalogue, Dispatcher, Envelope, Expect, Object};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Per-request deadline in milliseconds (overrides the config file)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Do not print updates
    #[arg(long)]
    pub no_updates: bool,

    /// Command to run, with its arguments (overrides the config file)
    #[arg(last = true)]
    pub command: Vec<String>,
}

pub async fn run(catalogue: Arc<Catalogue>, config: Config, args: BridgeArgs) -> Result<()> {
    let mut client_config = config.client.clone();
    if let Some(ms) = args.timeout_ms {
        client_config.request_timeout_ms = Some(ms);
    }

    let (program, program_args) = match args.command.split_first() {
        Some((program, rest)) => (program.clone(), rest.to_vec()),
        None => (
            config
                .bridge
                .command
                .clone()
                .context("no bridge command: pass one after `--` or set [bridge] command")?,
            config.bridge.args.clone(),
        ),
    };

    let mut child = Command::new(&program)
        .args(&program_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {}", program))?;
    let stdin = child.stdin.take().context("bridge stdin unavailable")?;
    let stdout = child.stdout.take().context("bridge stdout unavailable")?;
    tracing::info!("Started {} (pid {:?})", program, child.id());

    let (transport, outgoing) = ChannelTransport::new();
    let (client, inbound) = Client::new(catalogue.clone(), transport, client_config)?;

    let writer = tokio::spawn(write_requests(outgoing, stdin, client.clone()));
    let mut reader = tokio::spawn(read_messages(stdout, inbound));
    let printer = (!args.no_updates).then(|| tokio::spawn(print_updates(client.subscribe_updates())));

    let dispatcher = Dispatcher::new(catalogue);
    let reader_done = pump(
        &client,
        &dispatcher,
        stdin_lines(),
        tokio::signal::ctrl_c(),
        &mut reader,
    )
    .await?;
    client.shutdown("input finished");

    // Closing its stdin asks the process to exit.
    writer.abort();
    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(status) => tracing::info!("{} exited: {}", program, status?),
        Err(_) => {
            tracing::warn!("{} did not exit within {:?}, killing it", program, EXIT_GRACE);
            child.kill().await?;
        }
    }

    if !reader_done {
        reader.await?;
    }
    if let Some(printer) = printer {
        printer.await?;
    }
    Ok(())
}

/// Send each input line as a request until input ends, then wait for the
/// requests in flight.
///
/// An interrupt or the end of the peer's output shuts the client down, which
/// completes every request still waiting. Returns whether `reader` finished.
async fn pump(
    client: &Client,
    dispatcher: &Dispatcher,
    mut input: mpsc::UnboundedReceiver<std::io::Result<String>>,
    interrupt: impl Future<Output = std::io::Result<()>>,
    reader: &mut JoinHandle<()>,
) -> Result<bool> {
    let mut requests = JoinSet::new();
    // Completed futures are not polled again.
    tokio::pin!(interrupt);
    let mut interrupted = false;
    let mut reader_done = false;

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else { break };
                let line = line.context("reading stdin")?;
                if line.trim().is_empty() {
                    continue;
                }
                match parse_request(dispatcher, &line) {
                    Ok(request) => {
                        let client = client.clone();
                        requests.spawn(async move {
                            let tag = request.tag().to_string();
                            report(&tag, client.send(request).await);
                        });
                    }
                    Err(e) => tracing::warn!("Skipping input line: {}", e),
                }
            }
            signal = &mut interrupt => {
                interrupted = true;
                signal?;
                tracing::info!("Interrupted");
                client.shutdown("interrupted");
                break;
            }
            joined = &mut *reader, if !reader_done => {
                reader_done = true;
                joined?;
                client.shutdown("bridge output closed");
                break;
            }
        }
        if client.is_closed() {
            break;
        }
    }

    loop {
        tokio::select! {
            joined = requests.join_next() => match joined {
                Some(joined) => joined?,
                None => break,
            },
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                signal?;
                tracing::info!("Interrupted");
                client.shutdown("interrupted");
            }
            joined = &mut *reader, if !reader_done => {
                reader_done = true;
                joined?;
                client.shutdown("bridge output closed");
            }
        }
    }
    Ok(reader_done)
}

/// Stdin lines, read on a detached thread so a blocked read never holds up
/// exit.
fn stdin_lines() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Turn one input line into a request object. Any `@extra` given is
/// replaced by the client's own token.
fn parse_request(dispatcher: &Dispatcher, line: &str) -> Result<Object> {
    let envelope = Envelope::parse(line)?;
    let node = dispatcher.decode(&envelope.body, Expect::Any)?;
    let tag = node.tag().to_string();
    node.into_object()
        .ok_or_else(|| anyhow!("`{}` is not in the catalogue", tag))
}

fn report(tag: &str, outcome: Result<Reply, ClientError>) {
    match outcome {
        Ok(Reply::Value(node)) => println!("{}", node.to_json()),
        Ok(Reply::Error(err)) => println!(
            "{}",
            json!({"@type": "error", "code": err.code, "message": err.message})
        ),
        Err(e) => tracing::warn!("`{}` failed: {}", tag, e),
    }
}

async fn write_requests(
    mut outgoing: mpsc::UnboundedReceiver<String>,
    mut stdin: ChildStdin,
    client: Client,
) {
    while let Some(text) = outgoing.recv().await {
        let written = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(e) = written.await {
            tracing::warn!("Writing to bridge failed: {}", e);
            client.shutdown(format!("bridge stdin: {}", e));
            return;
        }
    }
}

async fn read_messages(stdout: ChildStdout, mut inbound: Inbound) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => inbound.on_raw_message(&line),
            Ok(None) => {
                tracing::info!("Bridge closed its output");
                return inbound.close(ChannelError::Closed);
            }
            Err(e) => return inbound.close(ChannelError::Transport(e.to_string())),
        }
    }
}

async fn print_updates(mut updates: Updates) {
    while let Some(update) = updates.recv().await {
        let mut value = update.object.to_json();
        if let Some(id) = update.client_id {
            value["@client_id"] = json!(id);
        }
        println!("{}", value);
    }
}
