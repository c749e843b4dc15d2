//! `tdproto decode`

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tdproto_core::{Catalogue, DecodeError, Dispatcher, Envelope, Expect, Node};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File of newline-delimited JSON; stdin when omitted
    pub input: Option<PathBuf>,

    /// Require every message to be a constructor of this class
    #[arg(long)]
    pub class: Option<String>,

    /// Pretty-print decoded messages
    #[arg(long)]
    pub pretty: bool,
}

pub async fn run(catalogue: Arc<Catalogue>, args: DecodeArgs) -> Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let dispatcher = Dispatcher::new(catalogue);
    let expect = args.class.as_deref().map_or(Expect::Any, Expect::Class);

    let mut lines = reader.lines();
    let (mut number, mut total, mut failed) = (0, 0, 0);
    while let Some(line) = lines.next_line().await? {
        number += 1;
        if line.trim().is_empty() {
            continue;
        }
        total += 1;
        match decode_line(&dispatcher, &line, expect) {
            Ok((envelope, node)) => {
                let body = node.to_json();
                let body = if args.pretty {
                    serde_json::to_string_pretty(&body)?
                } else {
                    body.to_string()
                };
                println!("{}\t{}", label(&envelope, &node), body);
            }
            Err(e) => {
                failed += 1;
                println!("line {}: {}", number, e);
            }
        }
    }

    tracing::info!("Decoded {} of {} messages", total - failed, total);
    if failed > 0 {
        bail!("{} of {} messages failed to decode", failed, total);
    }
    Ok(())
}

fn decode_line(
    dispatcher: &Dispatcher,
    line: &str,
    expect: Expect<'_>,
) -> Result<(Envelope, Node), DecodeError> {
    let envelope = Envelope::parse(line)?;
    let node = dispatcher.decode(&envelope.body, expect)?;
    Ok((envelope, node))
}

fn label(envelope: &Envelope, node: &Node) -> String {
    let mut label = node.tag().to_string();
    if node.is_unrecognized() {
        label.push_str(" (unrecognized)");
    }
    if let Some(token) = &envelope.token {
        label.push_str(&format!(" @extra={}", token));
    }
    if let Some(id) = envelope.client_id {
        label.push_str(&format!(" @client_id={}", id));
    }
    label
}
