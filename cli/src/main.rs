mod functions;
mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use renderer::{
    EvaluationMode, FunctionCollection, KernelArguments, KernelPromptTemplate,
    PromptTemplateConfig, RenderContext, Value,
};
use sktemplate::Block;

const SUBCOMMANDS: &[&str] = &["render", "test", "help"];

#[derive(Parser)]
#[command(name = "skt", version, about = "Semantic Kernel prompt template renderer")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a prompt template
    Render(RenderArgs),

    /// Run .test.prompt test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Template text file, or a .toml/.json prompt config
    file: String,

    /// Template argument as name=value. Repeatable.
    #[arg(short, long = "arg", value_name = "NAME=VALUE")]
    args: Vec<String>,

    /// TOML file of stub functions ([[function]] entries)
    #[arg(short, long)]
    functions: Option<String>,

    /// Do not HTML-encode variables and function results
    #[arg(long)]
    allow_unsafe: bool,

    /// Run function calls concurrently
    #[arg(long)]
    concurrent: bool,

    /// Parse and validate only (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed blocks
    #[arg(long)]
    blocks: bool,

    /// List declared and discovered input variables
    #[arg(long)]
    list_inputs: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.prompt file or directory containing them
    path: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // `skt file.txt` is shorthand for `skt render file.txt`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "render".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color).await,
        Command::Test(test_args) => {
            let exit_code = test_runner::run_tests(Path::new(&test_args.path)).await;
            process::exit(exit_code);
        }
    }
}

async fn do_render(args: RenderArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let prompt = match load_prompt(&args.file) {
        Ok(prompt) => prompt,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), prompt.template.clone());

    let template = KernelPromptTemplate::new(prompt)
        .with_allow_unsafe_content(args.allow_unsafe)
        .with_source_id(file_id);

    let blocks = match template.blocks() {
        Ok(blocks) => blocks,
        Err(errors) => {
            let diagnostics: Vec<Diagnostic<usize>> = errors.iter().map(|e| e.to_diagnostic()).collect();
            emit(&writer, &config, &files, &diagnostics);
            process::exit(1);
        }
    };

    let warnings: Vec<Diagnostic<usize>> = template.warnings().iter().map(|w| w.to_diagnostic()).collect();
    emit(&writer, &config, &files, &warnings);

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    if args.blocks {
        print_blocks(blocks);
        return;
    }

    if args.list_inputs {
        if let Ok(inputs) = template.input_variables() {
            for input in inputs {
                let default = input
                    .default
                    .as_deref()
                    .map(|d| format!(" (default: {})", d))
                    .unwrap_or_default();
                println!("{}{}", input.name, default);
                if !input.description.is_empty() {
                    println!("    {}", input.description);
                }
            }
        }
        return;
    }

    let functions = match &args.functions {
        Some(path) => match functions::load_functions(Path::new(path)) {
            Ok(functions) => functions,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => FunctionCollection::new(),
    };
    debug!(count = functions.functions().len(), "loaded stub functions");

    let arguments = match parse_args(&args.args) {
        Ok(arguments) => arguments,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mode = if args.concurrent {
        EvaluationMode::Concurrent
    } else {
        EvaluationMode::Sequential
    };
    let ctx = RenderContext::new(&functions).with_mode(mode);

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match template.render(&ctx, &arguments).await {
        Ok(output) => print!("{}", output),
        Err(error) => {
            emit(&writer, &config, &files, &error.to_diagnostics(file_id));
            process::exit(1);
        }
    }
}

/// Read a template file. `.toml` and `.json` files are prompt configs; any
/// other file is the template text itself.
fn load_prompt(file: &str) -> Result<PromptTemplateConfig, String> {
    let path = Path::new(file);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") || ext.eq_ignore_ascii_case("json") => {
            PromptTemplateConfig::from_file(path).map_err(|e| e.to_string())
        }
        _ => std::fs::read_to_string(path)
            .map(PromptTemplateConfig::new)
            .map_err(|e| format!("cannot read '{}': {}", file, e)),
    }
}

fn emit(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[Diagnostic<usize>],
) {
    for diagnostic in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, diagnostic);
    }
}

fn print_blocks(blocks: &[Block]) {
    for block in blocks {
        println!("{:<9} {:?} {:?}", block.block_type().to_string(), block.span(), block.content());
        if let Block::Code(code) = block {
            for token in &code.tokens {
                println!("  {:<9} {:?} {:?}", token.block_type().to_string(), token.span(), token.content());
            }
        }
    }
}

/// Parse `name=value` pairs into template arguments.
fn parse_args(pairs: &[String]) -> Result<KernelArguments, String> {
    let mut arguments = KernelArguments::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("argument '{}' is not of the form name=value", pair));
        };
        // Values are substituted as text, so they are kept exactly as typed.
        arguments.insert(name.trim(), Value::from(value));
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_value_pairs() {
        let args = parse_args(&["city=Paris".to_string(), "n=3".to_string(), "eq=a=b".to_string()])
            .expect("valid");
        assert_eq!(args.get("city"), Some(&Value::from("Paris")));
        assert_eq!(args.get("n"), Some(&Value::from("3")));
        assert_eq!(args.get("eq"), Some(&Value::from("a=b")));
        assert!(parse_args(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn argument_values_are_kept_verbatim() {
        let pairs = ["zip=02134", "ver=1.10", "id=12345678901234567890", "flag=true"].map(String::from);
        let args = parse_args(&pairs).expect("valid");
        let rendered: Vec<String> = ["zip", "ver", "id", "flag"]
            .iter()
            .map(|name| args.get(name).map(ToString::to_string).unwrap_or_default())
            .collect();
        assert_eq!(rendered, ["02134", "1.10", "12345678901234567890", "true"]);
    }
}
