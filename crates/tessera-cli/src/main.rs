use anyhow::{Context, Result, bail};
use std::{env, path::PathBuf, process, sync::Arc};
use tessera_config::{Config, SurfaceName};
use tessera_engine::{
    Editor, EditorOptions, LanguageRegistry, ParseOptions, Surface, format_tree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Tree,
    Html,
    Markdown,
    Decorations,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    file: PathBuf,
    format: Format,
    surface: Option<SurfaceName>,
}

fn parse_format(value: &str) -> Result<Format> {
    Ok(match value {
        "tree" => Format::Tree,
        "html" => Format::Html,
        "markdown" | "md" => Format::Markdown,
        "decorations" => Format::Decorations,
        other => bail!("unknown format '{other}' (expected tree, html, markdown or decorations)"),
    })
}

fn parse_surface(value: &str) -> Result<SurfaceName> {
    Ok(match value {
        "chat" => SurfaceName::Chat,
        "note" => SurfaceName::Note,
        "markdown" => SurfaceName::Markdown,
        other => bail!("unknown surface '{other}' (expected chat, note or markdown)"),
    })
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut file = None;
    let mut format = Format::Tree;
    let mut surface = None;

    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--format" | "-f" => {
                let value = rest.next().context("--format needs a value")?;
                format = parse_format(value)?;
            }
            "--surface" | "-s" => {
                let value = rest.next().context("--surface needs a value")?;
                surface = Some(parse_surface(value)?);
            }
            flag if flag.starts_with('-') => bail!("unknown option '{flag}'"),
            path => {
                if file.is_some() {
                    bail!("only one input file may be given");
                }
                file = Some(PathBuf::from(path));
            }
        }
    }

    Ok(Args {
        file: file.context("no input file given")?,
        format,
        surface,
    })
}

fn editor_options(config: &Config, surface: Option<SurfaceName>) -> EditorOptions {
    let surface = match surface.unwrap_or(config.surface) {
        SurfaceName::Chat => Surface::Chat,
        SurfaceName::Note => Surface::Note,
        SurfaceName::Markdown => Surface::Markdown,
    };
    EditorOptions {
        surface,
        parse: ParseOptions {
            soft_breaks_as_hard: config.soft_breaks_as_hard,
            max_nesting: config.parser.max_nesting,
        },
        defer_initial_highlight: config.highlight.defer_initial,
        max_diff_cells: config.reconcile.max_diff_cells,
    }
}

fn is_html(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

fn run(args: Args, config: Config) -> Result<String> {
    let options = editor_options(&config, args.surface);
    let languages = Arc::new(
        LanguageRegistry::builtin(&config.highlight.languages)
            .context("invalid highlight.languages in config")?,
    );

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let mut editor = if is_html(&args.file) {
        Editor::from_html(options, languages, &source)
    } else {
        Editor::from_markdown(options, languages, &source)
    }
    .with_context(|| format!("failed to import {}", args.file.display()))?;

    log::info!(
        "Imported {} ({} top-level blocks)",
        args.file.display(),
        editor.doc().child_count()
    );

    Ok(match args.format {
        Format::Tree => format_tree(editor.doc()),
        Format::Html => editor.get_content(),
        Format::Markdown => editor.get_markdown(),
        Format::Decorations => {
            if editor.run_deferred() {
                log::debug!("Ran deferred highlight pass");
            }
            let mut out = String::new();
            for decoration in editor.decorations().iter() {
                out.push_str(&format!(
                    "{}..{} {}\n",
                    decoration.from, decoration.to, decoration.class
                ));
            }
            out
        }
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let argv: Vec<String> = env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("tessera-cli");

    let args = match parse_args(&argv[1.min(argv.len())..]) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!(
                "Usage: {program} <file.md|file.html> [--format tree|html|markdown|decorations] [--surface chat|note|markdown]"
            );
            process::exit(1);
        }
    };

    let config_path = Config::config_path();
    let config = match Config::load() {
        Ok(Some(config)) => {
            log::info!("Loaded config from {}", config_path.display());
            config
        }
        Ok(None) => {
            log::debug!("No config at {}, using defaults", config_path.display());
            Config::default()
        }
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let output = run(args, config)?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults_to_tree() {
        let args = parse_args(&strings(&["notes.md"])).unwrap();
        assert_eq!(
            args,
            Args {
                file: PathBuf::from("notes.md"),
                format: Format::Tree,
                surface: None,
            }
        );
    }

    #[test]
    fn test_parse_args_with_options() {
        let args =
            parse_args(&strings(&["--format", "html", "a.md", "--surface", "chat"])).unwrap();
        assert_eq!(args.format, Format::Html);
        assert_eq!(args.surface, Some(SurfaceName::Chat));
        assert_eq!(args.file, PathBuf::from("a.md"));
    }

    #[test]
    fn test_parse_args_rejects_unknown_values() {
        assert!(parse_args(&strings(&["a.md", "--format", "pdf"])).is_err());
        assert!(parse_args(&strings(&["a.md", "--bogus"])).is_err());
        assert!(parse_args(&strings(&[])).is_err());
        assert!(parse_args(&strings(&["a.md", "b.md"])).is_err());
    }

    #[test]
    fn test_surface_flag_overrides_config() {
        let config = Config::default();
        assert_eq!(editor_options(&config, None).surface, Surface::Markdown);
        assert_eq!(
            editor_options(&config, Some(SurfaceName::Note)).surface,
            Surface::Note
        );
    }

    #[test]
    fn test_run_prints_markdown_round_trip() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(file, "# Title\n\nbody **bold**").unwrap();
        let args = Args {
            file: file.path().to_path_buf(),
            format: Format::Markdown,
            surface: None,
        };

        let output = run(args, Config::default()).unwrap();

        assert_eq!(output, "# Title\n\nbody **bold**");
    }

    #[test]
    fn test_run_reads_html_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
        write!(file, "<p>hello <em>there</em></p>").unwrap();
        let args = Args {
            file: file.path().to_path_buf(),
            format: Format::Markdown,
            surface: None,
        };

        let output = run(args, Config::default()).unwrap();

        assert_eq!(output, "hello *there*");
    }
}
