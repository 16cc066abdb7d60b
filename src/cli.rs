use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "web")]
use clap::ValueEnum;
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use termlight_rs::highlight::annotated_count;
use termlight_rs::{Span, TermRecord, highlight, parse_response_str};

#[derive(Parser, Debug)]
#[command(name = "termlight", about = "Highlight and explain the terms in a text", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the term records found in a saved model response.
    Terms {
        /// Chat-completion response JSON (`-` for stdin).
        #[arg(short, long)]
        response: PathBuf,
    },
    /// Highlight a text with the terms from a saved model response.
    Highlight {
        #[command(flatten)]
        input: TextInput,
        /// Chat-completion response JSON (`-` for stdin).
        #[arg(short, long)]
        response: PathBuf,
    },
    /// Ask the configured provider for terms and highlight the text.
    #[cfg(feature = "web")]
    Analyze {
        #[command(flatten)]
        input: TextInput,
        /// File holding a system prompt to use instead of the default one.
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /// Model name overriding the provider default.
        #[arg(long)]
        model: Option<String>,
    },
    /// Run the HTTP service.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind; defaults to 127.0.0.1 and `PORT` (5173).
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
        /// Stylesheet family for the HTML page.
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct TextInput {
    /// Text to analyse.
    #[arg(short, long)]
    text: Option<String>,
    /// File containing the text to analyse (`-` for stdin).
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl TextInput {
    fn read(&self) -> Result<String, Box<dyn Error>> {
        match (&self.text, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => read_source(path),
            (None, None) => Err("Provide either --text or --file".into()),
        }
    }

    fn uses_stdin(&self) -> bool {
        self.text.is_none() && self.file.as_deref().is_some_and(is_stdin)
    }
}

#[cfg(feature = "web")]
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Terms { response } => handle_terms(&response, cli.json),
        Command::Highlight { input, response } => handle_highlight(&input, &response, cli.json),
        #[cfg(feature = "web")]
        Command::Analyze {
            input,
            prompt_file,
            model,
        } => handle_analyze(&input, prompt_file.as_deref(), model.as_deref(), cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => handle_serve(addr, theme),
    }
}

fn handle_terms(response: &Path, as_json: bool) -> Result<(), Box<dyn Error>> {
    let terms = parse_response_str(&read_source(response)?);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&terms)?);
    } else {
        print_terms_table(&terms);
    }
    Ok(())
}

fn handle_highlight(
    input: &TextInput,
    response: &Path,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if input.uses_stdin() && is_stdin(response) {
        return Err("Only one of the text and the response can be read from stdin".into());
    }
    let text = input.read()?;
    let terms = parse_response_str(&read_source(response)?);
    let spans = highlight(&text, &terms);
    emit_spans(&spans, &terms, as_json)
}

#[cfg(feature = "web")]
fn handle_analyze(
    input: &TextInput,
    prompt_file: Option<&Path>,
    model: Option<&str>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    use termlight_rs::config::load_dotenv;
    use termlight_rs::prompt::resolve_prompt;
    use termlight_rs::provider::{ChatClient, ProviderConfig};

    termlight_rs::web::init_tracing();
    load_dotenv();
    let text = input.read()?;
    let text = text.trim();
    if text.is_empty() {
        return Err("Text is required".into());
    }
    let custom_prompt = prompt_file.map(fs::read_to_string).transpose()?;
    let client = ChatClient::new(ProviderConfig::from_env()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(client.complete(
        resolve_prompt(custom_prompt.as_deref()),
        text,
        model,
    ));
    let terms = match outcome {
        Ok(envelope) => termlight_rs::parse_response(&envelope),
        Err(err) => {
            eprintln!("warning: analysis failed ({err}); showing the original text");
            Vec::new()
        }
    };
    let spans = highlight(text, &terms);
    emit_spans(&spans, &terms, as_json)
}

#[cfg(feature = "web")]
fn handle_serve(
    addr: Option<std::net::SocketAddr>,
    theme: ThemeArg,
) -> Result<(), Box<dyn Error>> {
    use termlight_rs::config::WebConfig;
    use termlight_rs::web::{WebTheme, serve};

    termlight_rs::web::init_tracing();
    let mut config = WebConfig::from_env()?;
    if let Some(addr) = addr {
        config.addr = addr;
    }
    let theme = match theme {
        ThemeArg::Tailwind => WebTheme::Tailwind,
        ThemeArg::Bootstrap => WebTheme::Bootstrap,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, theme))?;
    Ok(())
}

fn emit_spans(
    spans: &[Span],
    terms: &[TermRecord],
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({
            "terms": terms,
            "annotated": annotated_count(spans),
            "spans": spans,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_spans(spans);
    }
    Ok(())
}

fn is_stdin(path: &Path) -> bool {
    path == Path::new("-")
}

fn read_source(path: &Path) -> Result<String, Box<dyn Error>> {
    if is_stdin(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()).into())
}

fn print_terms_table(terms: &[TermRecord]) {
    if terms.is_empty() {
        println!("No terms found in the response.");
        return;
    }
    let term_width = terms
        .iter()
        .map(|record| record.term.chars().count())
        .max()
        .unwrap_or(4)
        .max("TERM".len());
    let category_width = terms
        .iter()
        .map(|record| record.category.chars().count())
        .max()
        .unwrap_or(8)
        .max("CATEGORY".len());
    println!(
        "{:<term_width$}  {:<category_width$}  {}",
        "TERM", "CATEGORY", "DEFINITION"
    );
    println!(
        "{:-<term_width$}  {:-<category_width$}  {}",
        "", "", "----------"
    );
    for record in terms {
        println!(
            "{:<term_width$}  {:<category_width$}  {}",
            record.term, record.category, record.definition
        );
    }
}

/// Prints the text with numbered term markers, followed by the notes.
///
/// Repeated occurrences of the same term and definition share one note.
fn print_spans(spans: &[Span]) {
    let tty = stdout_is_tty();
    let skin = markdown_skin();
    let mut body = String::new();
    let mut notes: Vec<(&str, &str, &str)> = Vec::new();
    for span in spans {
        match span {
            Span::Literal { text, .. } => body.push_str(text),
            Span::Annotated {
                text,
                definition,
                category,
                ..
            } => {
                let key = (text.as_str(), definition.as_str(), category.as_str());
                let index = match notes.iter().position(|note| *note == key) {
                    Some(position) => position + 1,
                    None => {
                        notes.push(key);
                        notes.len()
                    }
                };
                if tty {
                    body.push_str(&skin.bold.apply_to(text.as_str()).to_string());
                } else {
                    body.push_str(text);
                }
                body.push_str(&format!("[{index}]"));
            }
        }
    }
    println!("{body}");
    if notes.is_empty() {
        return;
    }

    let listing = notes
        .iter()
        .enumerate()
        .map(|(idx, (term, definition, category))| {
            format!("- [{}] {term} ({category}): {definition}", idx + 1)
        })
        .collect::<Vec<_>>()
        .join("\n");
    println!();
    if tty {
        let formatted = FmtText::from(&skin, &listing, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{listing}");
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    MadSkin::default()
}
