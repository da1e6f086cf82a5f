//! Shell command - interactive client over one connection.
//!
//! Reads lines like `GET notes.txt`, `POST notes.txt ./local-file` or
//! `DELETE notes.txt` until `QUIT`. `POST url` without a file uploads the
//! local file of the same name. Any other verb is sent as is, and the server
//! answers it with FAIL-401.
//!
//! With `--compare <origin>` every request also goes straight to the origin
//! under the same identity, and both answers are printed with their
//! signatures. Each leg has its own session key, so the signatures differ
//! even when the answers agree. Both paths hit the same store: a POST that
//! succeeds through the relay is then refused on the direct path.

use anyhow::{Context, Result};
use channel_client::{Client, ClientIdentity};
use channel_types::{Command, Response};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};

const HELP: &str = "\
Commands:
  GET <url>              fetch an object
  POST <url> [file]      upload a file (default: the local file named <url>)
  DELETE <url>           delete an object you created
  HELP                   show this text
  QUIT                   close the connection
";

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Empty,
    Help,
    Quit,
    Request {
        command: Command,
        url: String,
        file: Option<PathBuf>,
    },
}

fn parse_line(line: &str) -> Line {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Line::Empty;
    };

    let verb = verb.to_ascii_uppercase();
    match verb.as_str() {
        "QUIT" | "EXIT" => Line::Quit,
        "HELP" | "?" => Line::Help,
        _ => {
            let url = words.next().unwrap_or("/").to_string();
            let file = words.next().map(PathBuf::from);
            Line::Request {
                command: Command::from(verb),
                url,
                file,
            }
        }
    }
}

/// Run the shell against `server` on stdin and stdout, optionally
/// mirroring every request to the origin at `compare`.
pub async fn run(server: &str, compare: Option<&str>, identity: ClientIdentity) -> Result<()> {
    let mut client = Client::connect(server, identity.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", server))?;
    let mut direct = match compare {
        Some(origin) => Some(
            Client::connect(origin, identity)
                .await
                .with_context(|| format!("Failed to connect to {}", origin))?,
        ),
        None => None,
    };

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "Connected to {} as {}\n{}",
                server,
                client.identity().client_id,
                HELP
            )
            .as_bytes(),
        )
        .await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_with(&mut client, direct.as_mut(), stdin, stdout).await?;
    client.close().await;
    if let Some(direct) = direct {
        direct.close().await;
    }
    Ok(())
}

async fn run_with<S, R, W>(
    client: &mut Client<S>,
    mut direct: Option<&mut Client<S>>,
    input: R,
    mut output: W,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let text = match parse_line(&line) {
            Line::Empty => continue,
            Line::Quit => break,
            Line::Help => HELP.to_string(),
            Line::Request { command, url, file } => {
                let content = match command {
                    Command::Post => {
                        let path = file.unwrap_or_else(|| PathBuf::from(&url));
                        match tokio::fs::read(&path).await {
                            Ok(content) => content,
                            Err(e) => {
                                let msg = format!("Cannot read {}: {}\n", path.display(), e);
                                output.write_all(msg.as_bytes()).await?;
                                continue;
                            }
                        }
                    }
                    _ => Vec::new(),
                };
                match direct.as_deref_mut() {
                    Some(direct) => {
                        let relayed = client.send(command.clone(), &url, content.clone()).await?;
                        let straight = direct.send(command, &url, content).await?;
                        compare(&relayed, &straight)
                    }
                    None => render(&client.send(command, &url, content).await?),
                }
            }
        };
        output.write_all(text.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(())
}

fn render(response: &Response) -> String {
    let mut text = format!("{} {}\n", response.status, response.url);
    if !response.content.is_empty() {
        text.push_str(&String::from_utf8_lossy(&response.content));
        text.push('\n');
    }
    text
}

fn compare(relayed: &Response, direct: &Response) -> String {
    let mut text = render(relayed);
    text.push_str(&format!("  relayed: {} signature {}\n", relayed.status, relayed.signature));
    text.push_str(&format!("  direct:  {} signature {}\n", direct.status, direct.signature));
    if relayed.status != direct.status || relayed.content != direct.content {
        text.push_str("  answers differ\n");
    }
    text
}
