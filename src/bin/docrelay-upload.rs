//! Command-line uploader for a docrelay server.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use docrelay::widget::WidgetState;
use docrelay::{LocalFile, UploadClient, UploadOptions, UploadWidget};

/// Upload a Word document to a docrelay server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Document to upload (.doc or .docx).
    file: PathBuf,

    /// Relay base URL.
    #[arg(long, env = "DOCRELAY_URL", default_value = "http://localhost:3001")]
    url: String,

    /// Owner namespace.
    #[arg(long)]
    user: Option<String>,

    /// Use the Word route (flat layout, week-long link).
    #[arg(long)]
    word: bool,

    /// Print the JSON response instead of a summary.
    #[arg(long)]
    json: bool,
}

fn render_line(widget: &UploadWidget) {
    let mut stderr = std::io::stderr();
    match widget.state() {
        WidgetState::Uploading { .. } => {
            let _ = write!(stderr, "\r{widget}");
        }
        _ => {
            let _ = writeln!(stderr, "\r{widget}");
        }
    }
    let _ = stderr.flush();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    docrelay::logging::init_console_only("warn");

    let client = match UploadClient::new(&args.url) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}: {}", e.error, e.details.unwrap_or_default());
            std::process::exit(2);
        }
    };

    let file = match LocalFile::from_path(&args.file).await {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}: {}", e.error, e.details.unwrap_or_default());
            std::process::exit(2);
        }
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    if args.word {
        let mut options = UploadOptions::default()
            .with_cancel(cancel)
            .with_progress(|p| {
                let _ = write!(std::io::stderr(), "\rUploading... {}%", p.percentage);
            });
        options.owner_id = args.user;

        match client.upload_word(&file, options).await {
            Ok(response) => {
                eprintln!();
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
                } else {
                    println!("{}", response.url);
                }
            }
            Err(e) => {
                eprintln!();
                eprintln!("Upload failed: {}", e.details.as_deref().unwrap_or(&e.error));
                std::process::exit(1);
            }
        }
        return;
    }

    let mut widget = UploadWidget::new()
        .with_max_size(client.policy().max_size())
        .with_cancel(cancel);
    if let Some(user) = args.user {
        widget = widget.with_owner(user);
    }

    if let Err(e) = widget.select(file) {
        eprintln!("{e}");
        std::process::exit(2);
    }
    render_line(&widget);

    if let Err(e) = widget.submit(&client, render_line).await {
        eprintln!("{e}");
        std::process::exit(2);
    }

    match widget.state() {
        WidgetState::Succeeded { file } if args.json => {
            println!("{}", serde_json::to_string_pretty(file).unwrap_or_default());
        }
        WidgetState::Succeeded { file } => println!("{}", file.download_url),
        _ => std::process::exit(1),
    }
}
