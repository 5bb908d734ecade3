// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with **bold** and *emphasis* and a [link](https://example.test).\n\n- Bullet point\n  - Nested item\n- Another item\n\n1. First\n2. Second\n\n> Quoted text\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_html_content(size: usize) -> String {
    let base = "<h1>Title</h1><p>Paragraph with <strong>bold</strong> and <em>emphasis</em>.</p><ul><li><p>Bullet</p></li><li><p>Another</p></li></ul><pre><code class=\"language-rust\">fn example() {}</code></pre>";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_list_runs(lists: usize) -> String {
    let mut content = String::new();
    for i in 0..lists {
        let marker = if i % 2 == 0 { '-' } else { '*' };
        content.push_str(&format!("{marker} item {i}\n\n"));
    }
    content
}
