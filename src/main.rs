//! DCIA 命令行入口

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use serde::Serialize;

use dcia::core::DciaError;
use dcia::env::{core as env_core, generate_env_docs, EnvConfig, EnvVar};
use dcia::translation::client::TaskPrompt;
use dcia::translation::core::{preview_documents, validate_text, BatchEvent, ProgressStatus};
use dcia::translation::{
    ConfigManager, DocumentOptions, DocumentTranslator, ExtractionMode, InputDocument,
    OllamaClient, SegmentTask, TranslationConfig,
};

#[derive(Parser)]
#[command(name = "dcia")]
#[command(version, about = "Translate SCENARI XML documents through a local Ollama backend")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the Ollama base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate, correct or reformulate XML documents
    Translate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value = "fr")]
        source: String,
        #[arg(short, long, default_value = "en")]
        target: String,
        #[arg(long, value_enum, default_value_t = DocumentTask::Translate)]
        task: DocumentTask,
        #[arg(short, long)]
        model: Option<String>,
        /// Output file (defaults to the generated name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace only direct text nodes, keeping inline markup
        #[arg(long)]
        direct: bool,
        /// Print a per-segment JSON report (single document, translation only)
        #[arg(long)]
        report: bool,
    },

    /// Translate a single text
    TranslateText {
        text: Option<String>,
        #[arg(short, long, default_value = "fr")]
        source: String,
        #[arg(short, long, default_value = "en")]
        target: String,
        #[arg(short, long)]
        model: Option<String>,
        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Correct a text and print the JSON result
    Correct {
        text: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Reformulate a text and print the JSON result
    Reformulate {
        text: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Summarize meeting notes and print the JSON result
    Summarize {
        text: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List available models, default first
    Models,

    /// Check whether the backend answers
    Health,

    /// Count translatable paragraphs per XML file
    Count {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the environment variable reference
    EnvDocs {
        /// Print the values currently in effect instead
        #[arg(long)]
        current: bool,
    },

    /// Write an example configuration file
    InitConfig {
        #[arg(default_value = "dcia.toml")]
        path: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DocumentTask {
    Translate,
    Correct,
    Reformulate,
}

fn init_tracing() {
    let level = env_core::LogLevel::get()
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DciaError> {
    match cli.command {
        Commands::EnvDocs { current: false } => {
            print!("{}", generate_env_docs());
            Ok(())
        }
        Commands::EnvDocs { current: true } => {
            let env = EnvConfig::from_env().map_err(|e| DciaError::new(&e.to_string()))?;
            env.print_summary();
            Ok(())
        }
        Commands::InitConfig { path } => {
            dcia::translation::generate_example_config(&path)?;
            println!("{}", path);
            Ok(())
        }
        Commands::Count { files } => cmd_count(&files),
        command => {
            let config = load_config(cli.config.as_deref(), cli.base_url.as_deref())?;
            let client = OllamaClient::new(config)?;
            run_backend_command(command, client).await
        }
    }
}

fn load_config(path: Option<&str>, base_url: Option<&str>) -> Result<TranslationConfig, DciaError> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.into_config();
    if let Some(url) = base_url {
        config.ollama_base_url = url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

async fn run_backend_command(command: Commands, client: OllamaClient) -> Result<(), DciaError> {
    match command {
        Commands::Translate {
            files,
            source,
            target,
            task,
            model,
            output,
            direct,
            report,
        } => {
            let task = match task {
                DocumentTask::Translate => SegmentTask::translate(&source, &target),
                DocumentTask::Correct => SegmentTask::Correct,
                DocumentTask::Reformulate => SegmentTask::Reformulate,
            };
            let mut options = DocumentOptions::from_config(client.config()).with_model(model);
            if direct {
                options.mode = ExtractionMode::DirectText;
            }
            let translator = DocumentTranslator::new(Arc::new(client));

            if report {
                cmd_translate_with_report(&translator, &files, &source, &target, &options, output)
                    .await
            } else {
                cmd_translate(&translator, &files, task, options, output).await
            }
        }
        Commands::TranslateText {
            text,
            source,
            target,
            model,
            stream,
        } => {
            let text = text_argument(text)?;
            if stream {
                let prompt = TaskPrompt::translate(&text, &source, &target)?;
                let request = client.build_request(&prompt, model.as_deref());
                let mut tokens = client.generate_stream(request).await?;
                let mut stdout = std::io::stdout();
                while let Some(token) = tokens.next().await {
                    stdout.write_all(token?.as_bytes())?;
                    stdout.flush()?;
                }
                println!();
            } else {
                let translated = client
                    .translate(&text, &source, &target, model.as_deref())
                    .await?;
                println!("{}", translated);
            }
            Ok(())
        }
        Commands::Correct { text, model } => {
            let text = text_argument(text)?;
            print_json(&client.correct(&text, model.as_deref()).await?)
        }
        Commands::Reformulate { text, model } => {
            let text = text_argument(text)?;
            print_json(&client.reformulate(&text, model.as_deref()).await?)
        }
        Commands::Summarize { text, model } => {
            let text = text_argument(text)?;
            print_json(&client.summarize(&text, model.as_deref()).await?)
        }
        Commands::Models => {
            for model in client.available_models().await {
                println!("{}", model);
            }
            Ok(())
        }
        Commands::Health => {
            if client.check_health().await {
                println!("ok: {}", client.config().ollama_base_url);
                Ok(())
            } else {
                Err(DciaError::new(&format!(
                    "backend unreachable at {}",
                    client.config().ollama_base_url
                )))
            }
        }
        Commands::Count { .. } | Commands::EnvDocs { .. } | Commands::InitConfig { .. } => Ok(()),
    }
}

async fn cmd_translate(
    translator: &DocumentTranslator,
    files: &[PathBuf],
    task: SegmentTask,
    options: DocumentOptions,
    output: Option<PathBuf>,
) -> Result<(), DciaError> {
    let documents = read_documents(files)?;
    let events = translator.process_documents(documents, task, options);
    futures::pin_mut!(events);

    let mut written = false;
    let mut failures = Vec::new();

    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Progress(event) => {
                let progress = &event.progress;
                match progress.status {
                    ProgressStatus::Translating => eprintln!(
                        "[{}/{}] {} {}/{}: {}",
                        event.file_index,
                        event.total_files,
                        progress.filename,
                        progress.current_element,
                        progress.total_elements,
                        progress.current_text
                    ),
                    ProgressStatus::Done => eprintln!(
                        "[{}/{}] {} done",
                        event.file_index, event.total_files, progress.filename
                    ),
                    ProgressStatus::Error => {
                        let message = progress.error_message.clone().unwrap_or_default();
                        eprintln!(
                            "[{}/{}] {} failed: {}",
                            event.file_index, event.total_files, progress.filename, message
                        );
                        failures.push(format!("{}: {}", progress.filename, message));
                    }
                }
            }
            BatchEvent::Complete(complete) => {
                let bytes = STANDARD
                    .decode(complete.content_base64.as_bytes())
                    .map_err(|e| DciaError::new(&format!("invalid output encoding: {}", e)))?;
                let path = output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&complete.filename));
                std::fs::write(&path, bytes)?;
                println!(
                    "{} ({} files, {} elements, {} words)",
                    path.display(),
                    complete.files_translated,
                    complete.elements_translated,
                    complete.total_words
                );
                written = true;
            }
            BatchEvent::Error { message } => failures.push(message),
            BatchEvent::Done => break,
        }
    }

    if written {
        Ok(())
    } else {
        Err(DciaError::new(&format!(
            "no output produced: {}",
            failures.join("; ")
        )))
    }
}

async fn cmd_translate_with_report(
    translator: &DocumentTranslator,
    files: &[PathBuf],
    source: &str,
    target: &str,
    options: &DocumentOptions,
    output: Option<PathBuf>,
) -> Result<(), DciaError> {
    let [file] = files else {
        return Err(DciaError::new("--report accepts exactly one file"));
    };
    let filename = file_name(file);
    let content = std::fs::read(file)?;

    let (bytes, report) = translator
        .translate_with_report(&content, source, target, options)
        .await?;

    let path = output.unwrap_or_else(|| PathBuf::from(dcia::core::output_filename(&filename, target)));
    std::fs::write(&path, bytes)?;
    print_json(&report)?;
    eprintln!("{}", path.display());
    Ok(())
}

fn cmd_count(files: &[PathBuf]) -> Result<(), DciaError> {
    let documents = read_documents(files)?;
    let previews = preview_documents(&documents);
    let total: usize = previews.iter().map(|p| p.translatable_elements).sum();

    for preview in &previews {
        println!("{}: {}", preview.filename, preview.translatable_elements);
    }
    println!("total: {}", total);
    Ok(())
}

fn read_documents(files: &[PathBuf]) -> Result<Vec<InputDocument>, DciaError> {
    files
        .iter()
        .map(|path| {
            let content = std::fs::read(path)
                .map_err(|e| DciaError::new(&format!("{}: {}", path.display(), e)))?;
            Ok(InputDocument::new(file_name(path), content))
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 参数为空时从标准输入读取
fn text_argument(text: Option<String>) -> Result<String, DciaError> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    validate_text(&text, "input text")?;
    Ok(text)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DciaError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DciaError::new(&format!("failed to encode JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}
