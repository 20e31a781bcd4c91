//! Deterministic synthetic documents for benches and perf tests.

pub const BLOCK_TEMPLATE: &str = "<div class=box><span>hello &amp; bye</span><img src=x alt='a b'><br/></div>";

/// Markup the default vocabulary does not know.
pub const UNKNOWN_TEMPLATE: &str = "<x-card data-id=7><x-title>t</x-title></x-card>";

pub fn make_blocks(blocks: usize) -> String {
    repeat(BLOCK_TEMPLATE, blocks)
}

pub fn make_unknown_blocks(blocks: usize) -> String {
    repeat(UNKNOWN_TEMPLATE, blocks)
}

/// Document of `bytes` plain text wrapped in one paragraph.
pub fn make_text(bytes: usize) -> String {
    let mut html = String::with_capacity(bytes + 7);
    html.push_str("<p>");
    html.extend(std::iter::repeat_n('a', bytes));
    html.push_str("</p>");
    html
}

/// Page with a head, a long script, a table and comments.
pub fn make_page(rows: usize) -> String {
    let mut html = String::with_capacity(rows * 64 + 256);
    html.push_str("<!DOCTYPE html><html><head><title>t</title>");
    html.push_str("<script>for (var i = 0; i < 10; i++) { if (a < b) { go(\"</p>\"); } }</script>");
    html.push_str("</head><body><!-- rows --><table class=grid>");
    for row in 0..rows {
        html.push_str("<tr><td align=right>");
        html.push_str(&row.to_string());
        html.push_str("</td><td>caf&eacute; &lt;</td></tr>");
    }
    html.push_str("</table></body></html>");
    html
}

fn repeat(template: &str, count: usize) -> String {
    let mut html = String::with_capacity(template.len() * count);
    for _ in 0..count {
        html.push_str(template);
    }
    html
}
