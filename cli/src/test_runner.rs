use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use renderer::{
    EvaluationMode, InputVariable, KernelArguments, KernelPromptTemplate, PromptTemplateConfig,
    RenderContext, Value,
};
use sktemplate::parser::ParseError;

use crate::functions::{StubFunctionDef, build_functions};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Render without HTML encoding.
    #[serde(default)]
    pub allow_unsafe_content: bool,

    /// Run function calls concurrently.
    #[serde(default)]
    pub concurrent: bool,

    /// Template arguments.
    #[serde(default)]
    pub args: BTreeMap<String, toml::Value>,

    /// Declared input variables.
    #[serde(default)]
    pub input_variables: Vec<InputVariable>,

    /// Stub functions available to the template.
    #[serde(default)]
    pub function: Vec<StubFunctionDef>,

    /// Expected rendered output, compared exactly.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected render error; the error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the template is expected to fail validation.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected input variable names, declared then discovered.
    #[serde(default)]
    pub expect_inputs: Option<Vec<String>>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Parse a `.test.prompt` file into its TOML config and template text.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    // The file's final newline ends the body; anything before it is template text.
    let source = source
        .strip_suffix("\r\n")
        .or_else(|| source.strip_suffix('\n'))
        .unwrap_or(source);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

async fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let description = config.description.clone();
    let outcome = match check(&config, source).await {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Run one test. Returns `Some(reason)` on failure.
async fn check(config: &TestConfig, source: &str) -> Option<String> {
    let mut prompt = PromptTemplateConfig::new(source);
    for variable in &config.input_variables {
        if let Err(e) = prompt.add_input_variable(variable.clone()) {
            return Some(format!("invalid input variables: {}", e));
        }
    }
    let template =
        KernelPromptTemplate::new(prompt).with_allow_unsafe_content(config.allow_unsafe_content);

    let parse_result = template.blocks();
    if config.expect_parse_error {
        return match parse_result {
            Err(_) => None,
            Ok(_) => Some("expected parse error, but parsing succeeded".into()),
        };
    }
    if let Err(errors) = parse_result {
        let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        return Some(format!("unexpected parse error: {}", msgs.join("; ")));
    }

    if let Some(expected) = &config.expect_inputs {
        let actual: Vec<&str> = template
            .input_variables()
            .map(|inputs| inputs.iter().map(|v| v.name.as_str()).collect())
            .unwrap_or_default();
        if actual != *expected {
            return Some(format!(
                "input variables mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected_warnings) = &config.expect_warnings {
        if let Some(reason) = check_warnings(source, template.warnings(), expected_warnings) {
            return Some(reason);
        }
    }

    let functions = match build_functions(&config.function) {
        Ok(functions) => functions,
        Err(e) => return Some(format!("invalid functions: {}", e)),
    };
    let arguments: KernelArguments = config
        .args
        .iter()
        .map(|(name, value)| (name.as_str(), Value::from(value.clone())))
        .collect();
    let mode = if config.concurrent {
        EvaluationMode::Concurrent
    } else {
        EvaluationMode::Sequential
    };
    let ctx = RenderContext::new(&functions).with_mode(mode);
    let result = template.render(&ctx, &arguments).await;

    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected_err), _, Err(err)) => {
            let err_str = err.to_string();
            if err_str.contains(expected_err.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected_err, err_str
                ))
            }
        }
        (Some(expected_err), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but rendering succeeded",
            expected_err
        )),
        (None, _, Err(err)) => Some(format!("unexpected render error: {}", err)),
        (None, Some(expected_output), Ok(actual)) => {
            if actual == *expected_output {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected: {:?}\n  actual:   {:?}",
                    expected_output, actual
                ))
            }
        }
        (None, None, Ok(_)) => None,
    }
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual warnings match expectations. Returns `Some(reason)` on mismatch.
fn check_warnings(source: &str, warnings: &[ParseError], expected: &[ExpectedWarning]) -> Option<String> {
    if warnings.len() != expected.len() {
        let actual_msgs: Vec<String> = warnings.iter().map(|w| format!("  - {}", w)).collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            warnings.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected.iter()).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }

        if let Some(expected_line) = expected.line {
            let actual_line = byte_offset_to_line(source, actual.span.start);
            if actual_line != expected_line {
                return Some(format!(
                    "warning[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

fn collect_tests(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.prompt"))
        {
            out.push(path);
        }
    }
}

/// Run a `.test.prompt` file, or every one found under a directory.
/// Returns the exit code: 0 when all pass, 1 otherwise.
pub async fn run_tests(path: &Path) -> i32 {
    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        let mut files = Vec::new();
        collect_tests(path, &mut files);
        files.sort();
        files
    };
    if files.is_empty() {
        eprintln!("no .test.prompt files found in {}", path.display());
        return 1;
    }

    let mut failures: Vec<TestResult> = Vec::new();
    for file in &files {
        let result = run_single_test(file).await;
        let name = file.strip_prefix(path).unwrap_or(file).display();
        let label = result.description.as_deref().unwrap_or_default();
        match &result.outcome {
            TestOutcome::Pass => eprintln!("  PASS  {}  {}", name, label),
            TestOutcome::Fail(_) => {
                eprintln!("  FAIL  {}  {}", name, label);
                failures.push(result);
            }
        }
    }

    for failure in &failures {
        if let TestOutcome::Fail(reason) = &failure.outcome {
            eprintln!("\n--- {} ---", failure.path.display());
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }

    let failed = failures.len();
    eprintln!(
        "\ntest result: {}. {} passed, {} failed",
        if failed == 0 { "ok" } else { "FAILED" },
        files.len() - failed,
        failed
    );
    if failed == 0 { 0 } else { 1 }
}
