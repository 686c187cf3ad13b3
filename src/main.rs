use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docask::{
    CompletionClient,
    CompletionResult,
    Config,
    Error,
    LoadReport,
    Result,
    Session,
    cli::{AskArgs, Cli, Command, ExtractArgs},
    config::{Overrides, config_file_path},
    loader,
    text_util::{DEFAULT_PREVIEW_CHARS, char_count, preview},
    vocab::{DistanceMethod, ResponseSignal, VectorDbBackend},
    walker,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCASK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let overrides = cli.overrides();

    match cli.command {
        Command::Ask(args) => cmd_ask(&overrides, &args),
        Command::Extract(args) => cmd_extract(&args),
        Command::Vocab(args) => {
            cmd_vocab(args.json);
            Ok(())
        }
        Command::Config(args) => cmd_config(&overrides, args.json),
        Command::Completions(args) => {
            args.generate();
            Ok(())
        }
    }
}

fn load(paths: &[PathBuf], include: Option<&str>) -> Result<LoadReport> {
    let glob = include
        .map(|pattern| {
            globset::Glob::new(pattern)
                .map(|glob| glob.compile_matcher())
                .map_err(|e| {
                    Error::Config(format!("invalid glob pattern: {e}"))
                })
        })
        .transpose()?;

    let inputs = walker::collect_inputs(paths, glob.as_ref())?;
    if inputs.is_empty() {
        return Err(Error::NotFound {
            kind: "document",
            name: "no .txt or .pdf files in the given paths".to_string(),
        });
    }

    Ok(loader::load_documents(&inputs))
}

fn cmd_ask(overrides: &Overrides, args: &AskArgs) -> Result<()> {
    let config = Config::resolve(overrides)?;
    let report = load(&args.paths, args.include.as_deref())?;
    if report.is_empty() {
        return Err(Error::NotFound {
            kind: "document text",
            name: "none of the given files produced any text".to_string(),
        });
    }

    let content = report.combined();
    eprintln!(
        "Successfully processed {} file(s). Total characters: {}",
        report.files_processed(),
        char_count(&content)
    );

    let client = CompletionClient::from_config(&config)?;
    let mut session = Session::new(client, config.max_content_chars);
    session.set_content(content);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        if let Some(question) = &args.question {
            let result = session.ask(question, &cancel).await;
            // Failures are reported once, by `main`, unless JSON was asked for.
            match result {
                _ if args.json => print_result(result, true),
                Ok(completion) => println!("{}", completion.text),
                Err(_) => {}
            }
            return result.clone().map(|_| ()).map_err(Error::from);
        }

        interactive(&mut session, &cancel, args.json).await
    })
}

async fn interactive(
    session: &mut Session,
    cancel: &CancellationToken,
    json: bool,
) -> Result<()> {
    eprintln!("Ask a question (:clear to forget the last answer, :quit to exit).");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":clear" => {
                session.clear_answer();
                eprintln!("Cleared the last answer.");
            }
            question => {
                let result = session.ask(question, cancel).await;
                print_result(result, json);
                if cancel.is_cancelled() {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn print_result(result: &CompletionResult, json: bool) {
    if json {
        let value = match result {
            Ok(completion) => json!({
                "answer": completion.text,
                "attempts": completion.attempts,
            }),
            Err(e) => json!({
                "error": e.to_string(),
                "attempts": e.attempts(),
                "status": e.status(),
            }),
        };
        println!("{value}");
        return;
    }

    match result {
        Ok(completion) => println!("{}", completion.text),
        Err(e) => println!("{e}"),
    }
}

fn cmd_extract(args: &ExtractArgs) -> Result<()> {
    let report = load(&args.paths, args.include.as_deref())?;
    let content = report.combined();

    if args.json {
        let files: Vec<_> = report
            .documents
            .iter()
            .map(|doc| {
                json!({
                    "name": doc.name,
                    "path": doc.path,
                    "chars": char_count(&doc.text),
                })
            })
            .collect();
        let value = json!({
            "files": files,
            "diagnostics": report.diagnostics,
            "totalChars": char_count(&content),
            "preview": preview(&content, DEFAULT_PREVIEW_CHARS),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{content}");
        eprintln!(
            "Processed {} file(s), {} with text. Total characters: {}",
            report.files_processed(),
            report.documents.len(),
            char_count(&content)
        );
    }

    Ok(())
}

fn cmd_vocab(json: bool) {
    let signals: Vec<_> =
        ResponseSignal::ALL.iter().map(|s| s.as_str()).collect();
    let backends: Vec<_> =
        VectorDbBackend::ALL.iter().map(|b| b.as_str()).collect();
    let distances: Vec<_> =
        DistanceMethod::ALL.iter().map(|d| d.as_str()).collect();

    if json {
        println!(
            "{}",
            json!({
                "responseSignals": signals,
                "vectorDbBackends": backends,
                "distanceMethods": distances,
            })
        );
        return;
    }

    println!("Response signals:");
    for signal in ResponseSignal::ALL {
        println!("  {signal:?}\t{signal}");
    }
    println!("Vector database backends:");
    for backend in VectorDbBackend::ALL {
        println!("  {backend:?}\t{backend}");
    }
    println!("Distance methods:");
    for method in DistanceMethod::ALL {
        println!("  {method:?}\t{method}");
    }
}

fn cmd_config(overrides: &Overrides, json: bool) -> Result<()> {
    let config = Config::resolve(overrides)?;
    let file = overrides.config_file.clone().or_else(config_file_path);
    let api_key = config
        .redacted_api_key()
        .unwrap_or_else(|| "(not set)".to_string());

    if json {
        println!(
            "{}",
            json!({
                "configFile": file,
                "endpoint": config.endpoint,
                "model": config.model,
                "apiKey": api_key,
                "maxAttempts": config.max_attempts,
                "backoffUnitMs": config.backoff_unit.as_millis() as u64,
                "attemptTimeoutSecs": config.attempt_timeout.as_secs(),
                "maxContentChars": config.max_content_chars,
            })
        );
        return Ok(());
    }

    match &file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none)"),
    }
    println!("Endpoint: {}", config.endpoint);
    println!("Model: {}", config.model);
    println!("API key: {api_key}");
    println!("Max attempts: {}", config.max_attempts);
    println!("Backoff unit: {:?}", config.backoff_unit);
    println!("Attempt timeout: {:?}", config.attempt_timeout);
    println!("Max content characters: {}", config.max_content_chars);
    Ok(())
}
