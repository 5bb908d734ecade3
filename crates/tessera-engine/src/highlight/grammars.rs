//! Built-in grammars. Rule order matters: comments and strings come first so
//! keywords inside them are not picked out.

use std::sync::OnceLock;

use super::language::Grammar;

const DOUBLE_QUOTED: &str = r#""(?:[^"\\]|\\.)*""#;
const SINGLE_QUOTED: &str = r"'(?:[^'\\\n]|\\.)*'";
const NUMBER: &str = r"\b(?:0[xX][0-9a-fA-F_]+|\d[\d_]*(?:\.\d[\d_]*)?(?:[eE][+-]?\d+)?)";

const RUST_KEYWORDS: &str = r"\b(?:as|async|await|break|const|continue|crate|dyn|else|enum|extern|fn|for|if|impl|in|let|loop|match|mod|move|mut|pub|ref|return|self|Self|static|struct|super|trait|type|unsafe|use|where|while)\b";
const JS_KEYWORDS: &str = r"\b(?:async|await|break|case|catch|class|const|continue|default|delete|do|else|export|extends|finally|for|from|function|if|import|in|instanceof|let|new|of|return|static|super|switch|this|throw|try|typeof|var|void|while|yield)\b";
const TS_KEYWORDS: &str = r"\b(?:abstract|as|declare|enum|implements|interface|keyof|namespace|private|protected|public|readonly|type)\b";
const PYTHON_KEYWORDS: &str = r"\b(?:and|as|assert|async|await|break|class|continue|def|del|elif|else|except|finally|for|from|global|if|import|in|is|lambda|nonlocal|not|or|pass|raise|return|try|while|with|yield)\b";
const SHELL_KEYWORDS: &str = r"\b(?:if|then|else|elif|fi|for|while|until|do|done|case|esac|in|function|return|export|local|readonly)\b";

fn rust() -> Result<Grammar, super::HighlightError> {
    Grammar::new(
        "rust",
        &["rs"],
        &[
            ("hl-comment", r"//[^\n]*|/\*[\s\S]*?\*/"),
            ("hl-string", format!("b?{DOUBLE_QUOTED}").as_str()),
            ("hl-string", r"'(?:[^'\\\n]|\\.)'"),
            ("hl-attribute", r"#!?\[[^\]\n]*\]"),
            ("hl-keyword", RUST_KEYWORDS),
            ("hl-literal", r"\b(?:true|false|None|Some|Ok|Err)\b"),
            ("hl-function", r"\b[a-z_][a-z0-9_]*!"),
            ("hl-type", r"\b[A-Z][A-Za-z0-9_]*\b"),
            ("hl-number", NUMBER),
        ],
    )
}

fn javascript_rules(extra_keywords: Option<&str>) -> Vec<(&'static str, String)> {
    let mut rules = vec![
        ("hl-comment", r"//[^\n]*|/\*[\s\S]*?\*/".to_string()),
        ("hl-string", format!(r"{DOUBLE_QUOTED}|{SINGLE_QUOTED}|`(?:[^`\\]|\\.)*`")),
        ("hl-keyword", JS_KEYWORDS.to_string()),
    ];
    if let Some(extra) = extra_keywords {
        rules.push(("hl-keyword", extra.to_string()));
    }
    rules.extend([
        ("hl-literal", r"\b(?:true|false|null|undefined|NaN|Infinity)\b".to_string()),
        ("hl-type", r"\b[A-Z][A-Za-z0-9_$]*\b".to_string()),
        ("hl-number", NUMBER.to_string()),
    ]);
    rules
}

fn borrowed<'a>(rules: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    rules.iter().map(|(class, p)| (*class, p.as_str())).collect()
}

fn javascript() -> Result<Grammar, super::HighlightError> {
    let rules = javascript_rules(None);
    Grammar::new("javascript", &["js", "jsx", "mjs", "cjs"], &borrowed(&rules))
}

fn typescript() -> Result<Grammar, super::HighlightError> {
    let rules = javascript_rules(Some(TS_KEYWORDS));
    Grammar::new("typescript", &["ts", "tsx", "mts"], &borrowed(&rules))
}

fn python() -> Result<Grammar, super::HighlightError> {
    Grammar::new(
        "python",
        &["py", "python3"],
        &[
            ("hl-comment", r"#[^\n]*"),
            ("hl-string", r#""""[\s\S]*?"""|'''[\s\S]*?'''"#),
            ("hl-string", format!(r#"[rbfRBF]?(?:"(?:[^"\\\n]|\\.)*"|{SINGLE_QUOTED})"#).as_str()),
            ("hl-attribute", r"@[\w.]+"),
            ("hl-keyword", PYTHON_KEYWORDS),
            ("hl-literal", r"\b(?:True|False|None)\b"),
            ("hl-type", r"\b[A-Z][A-Za-z0-9_]*\b"),
            ("hl-number", NUMBER),
        ],
    )
}

fn json() -> Result<Grammar, super::HighlightError> {
    Grammar::new(
        "json",
        &["jsonc", "json5"],
        &[
            ("hl-string", DOUBLE_QUOTED),
            ("hl-literal", r"\b(?:true|false|null)\b"),
            ("hl-number", r"-?\b\d+(?:\.\d+)?(?:[eE][+-]?\d+)?\b"),
        ],
    )
}

fn shell() -> Result<Grammar, super::HighlightError> {
    Grammar::new(
        "shell",
        &["sh", "bash", "zsh", "console", "shellscript"],
        &[
            ("hl-comment", r"#[^\n]*"),
            ("hl-string", format!("{DOUBLE_QUOTED}|'[^']*'").as_str()),
            ("hl-variable", r"\$\{[^}\n]*\}|\$[A-Za-z_][A-Za-z0-9_]*|\$[0-9@#?*$!-]"),
            ("hl-keyword", SHELL_KEYWORDS),
        ],
    )
}

pub(crate) fn builtins() -> &'static [Grammar] {
    static BUILTINS: OnceLock<Vec<Grammar>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        [rust, javascript, typescript, python, json, shell]
            .into_iter()
            .map(|build| build().expect("Invalid built-in grammar"))
            .collect()
    })
}
