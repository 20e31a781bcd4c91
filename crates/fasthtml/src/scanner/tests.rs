use super::{Scanner, ScannerStats};
use crate::config::ScannerConfig;
use crate::error::{ScanIssue, ScanIssueCode};
use crate::token::{Quote, Token, TokenKind};
use crate::vocabulary::Vocabulary;
use encoding_rs::WINDOWS_1252;

fn scan(input: &str) -> Vec<Token> {
    Scanner::with_defaults(input).collect()
}

fn scan_with(input: &str, config: ScannerConfig) -> (Vec<Token>, Vec<ScanIssue>) {
    let mut scanner = Scanner::new(input, Vocabulary::html(), config);
    let tokens: Vec<Token> = scanner.by_ref().collect();
    (tokens, scanner.issues().to_vec())
}

fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
    tokens.iter().map(|token| token.kind).collect()
}

fn issue(code: ScanIssueCode, position: usize) -> ScanIssue {
    ScanIssue { code, position }
}

#[test]
fn open_text_close() {
    let tokens = scan("<div class='a'>Hi</div>");
    assert!(
        matches!(
            tokens.as_slice(),
            [open, text, close]
                if open.kind == TokenKind::OpenTag
                    && &*open.name == "div"
                    && open.params.len() == 1
                    && &*open.params[0].name == "class"
                    && open.params[0].value == "a"
                    && open.params[0].quote == Quote::Single
                    && text.kind == TokenKind::Text
                    && text.text == "Hi"
                    && close.kind == TokenKind::CloseTag
                    && &*close.name == "div"
                    && close.flags.closing
                    && !close.flags.self_closing
        ),
        "expected open/text/close, got: {tokens:?}"
    );
    let html: String = tokens.iter().map(Token::generate_html).collect();
    assert_eq!(html, "<div class=a>Hi</div>");
}

#[test]
fn self_closing_tag_is_a_close_tag() {
    let tokens = scan("<br/>");
    assert_eq!(tokens.len(), 1, "got: {tokens:?}");
    let br = &tokens[0];
    assert_eq!(br.kind, TokenKind::CloseTag);
    assert!(br.flags.closing && br.flags.self_closing);
    assert!(br.params.is_empty());
    assert_eq!(br.generate_html(), "<br/>");
}

#[test]
fn self_closing_after_unquoted_value() {
    let tokens = scan("<img src=x.png/>");
    assert_eq!(tokens.len(), 1, "got: {tokens:?}");
    assert_eq!(tokens[0].kind, TokenKind::CloseTag);
    assert_eq!(tokens[0].param_value("src"), "x.png");
    assert_eq!(tokens[0].generate_html(), "<img src=x.png/>");
}

#[test]
fn void_element_without_slash_stays_open() {
    let tokens = scan("<br>");
    assert_eq!(kinds(&tokens), vec![TokenKind::OpenTag]);
}

#[test]
fn comment_preserves_inner_text() {
    let tokens = scan("<!-- hi -->");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Comment);
    assert_eq!(&*tokens[0].name, "!--");
    assert_eq!(tokens[0].text, " hi ");
    assert_eq!(tokens[0].generate_html(), "<!-- hi -->");
}

#[test]
fn empty_comment_forms() {
    let tokens = scan("<!----><!-->");
    assert_eq!(kinds(&tokens), vec![TokenKind::Comment, TokenKind::Comment]);
    assert!(tokens.iter().all(|token| token.text.is_empty()));
}

#[test]
fn three_dash_comment_is_closed() {
    let tokens = scan("<!--->x<!--->");
    assert_eq!(
        kinds(&tokens),
        vec![TokenKind::Comment, TokenKind::Text, TokenKind::Comment]
    );
    assert_eq!(tokens[0].text, "");
    assert_eq!(tokens[1].text, "x");
    assert_eq!(tokens[2].text, "");
}

#[test]
fn cdata_and_declarations() {
    let tokens = scan("<!DOCTYPE html><?xml version=\"1.0\"?><![CDATA[x<y]]>");
    assert_eq!(tokens.len(), 3, "got: {tokens:?}");
    assert_eq!(&*tokens[0].name, "!doctype");
    assert_eq!(tokens[0].text, " html");
    assert_eq!(tokens[0].generate_html(), "<!doctype html>");
    assert_eq!(&*tokens[1].name, "?xml");
    assert_eq!(tokens[1].generate_html(), "<?xml version=\"1.0\"?>");
    assert_eq!(&*tokens[2].name, "![CDATA[");
    assert_eq!(tokens[2].text, "x<y");
    assert_eq!(tokens[2].generate_html(), "<![CDATA[x<y]]>");
}

#[test]
fn script_body_is_one_token() {
    let tokens = scan("<script>if (a < b) { x(\"</p>\"); }</ScRiPt><p>");
    assert!(
        matches!(
            tokens.as_slice(),
            [open, body, close, p]
                if open.kind == TokenKind::OpenTag
                    && &*open.name == "script"
                    && body.kind == TokenKind::Script
                    && &*body.name == "script"
                    && body.text == "if (a < b) { x(\"</p>\"); }"
                    && close.kind == TokenKind::CloseTag
                    && &*close.name == "script"
                    && &*p.name == "p"
        ),
        "expected raw script body, got: {tokens:?}"
    );
}

#[test]
fn style_body_and_empty_script() {
    let tokens = scan("<style>p > a { color: red }</style><script></script>");
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::OpenTag,
            TokenKind::Script,
            TokenKind::CloseTag,
            TokenKind::OpenTag,
            TokenKind::CloseTag,
        ]
    );
    assert_eq!(&*tokens[1].name, "style");
    assert_eq!(tokens[1].text, "p > a { color: red }");
}

#[test]
fn unterminated_script_runs_to_end() {
    let (tokens, issues) = scan_with("<script>var a = '<b>';", ScannerConfig::default());
    assert_eq!(kinds(&tokens), vec![TokenKind::OpenTag, TokenKind::Script]);
    assert_eq!(tokens[1].text, "var a = '<b>';");
    assert_eq!(issues, vec![issue(ScanIssueCode::UnterminatedRawText, 8)]);
}

#[test]
fn stray_less_than_joins_text() {
    let (tokens, issues) = scan_with("a < b <3 x<", ScannerConfig::default());
    assert_eq!(tokens.len(), 1, "got: {tokens:?}");
    assert_eq!(tokens[0].text, "a < b <3 x<");
    assert_eq!(
        issues,
        vec![
            issue(ScanIssueCode::StrayLessThan, 2),
            issue(ScanIssueCode::StrayLessThan, 6),
            issue(ScanIssueCode::StrayLessThan, 10),
        ]
    );
}

#[test]
fn empty_close_tag_is_text() {
    let tokens = scan("x</>y");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].text, "x</>y");
}

#[test]
fn tag_cut_off_by_end_of_input_is_text() {
    let (tokens, issues) = scan_with("text <div class=\"x", ScannerConfig::default());
    assert_eq!(tokens.len(), 1, "got: {tokens:?}");
    assert_eq!(tokens[0].kind, TokenKind::Text);
    assert_eq!(tokens[0].text, "text <div class=\"x");
    assert_eq!(issues, vec![issue(ScanIssueCode::UnterminatedTag, 5)]);
}

#[test]
fn less_than_inside_tag_resynchronizes() {
    let (tokens, issues) = scan_with("<div <p>x", ScannerConfig::default());
    assert!(
        matches!(
            tokens.as_slice(),
            [broken, p, x]
                if broken.kind == TokenKind::Text
                    && broken.text == "<div "
                    && p.kind == TokenKind::OpenTag
                    && &*p.name == "p"
                    && x.text == "x"
        ),
        "expected text then <p>, got: {tokens:?}"
    );
    assert_eq!(issues, vec![issue(ScanIssueCode::UnterminatedTag, 0)]);
}

#[test]
fn broken_close_tag_resynchronizes() {
    let tokens = scan("</div <b>bold</b>");
    assert_eq!(tokens[0].text, "</div ");
    assert_eq!(&*tokens[1].name, "b");
}

#[test]
fn unterminated_comment_runs_to_end() {
    let (tokens, issues) = scan_with("a<!-- never", ScannerConfig::default());
    assert_eq!(kinds(&tokens), vec![TokenKind::Text, TokenKind::Comment]);
    assert_eq!(tokens[1].text, " never");
    assert_eq!(issues, vec![issue(ScanIssueCode::UnterminatedComment, 1)]);
}

#[test]
fn duplicate_attribute_keeps_first() {
    let (tokens, issues) = scan_with("<a href=1 HREF=2 rel=x>", ScannerConfig::default());
    assert_eq!(tokens.len(), 1);
    let names: Vec<&str> = tokens[0].params.iter().map(|p| &*p.name).collect();
    assert_eq!(names, vec!["href", "rel"]);
    assert_eq!(tokens[0].param_value("href"), "1");
    assert_eq!(issues, vec![issue(ScanIssueCode::DuplicateAttribute, 10)]);
}

#[test]
fn names_are_lower_cased_and_values_are_not() {
    let tokens = scan("<DIV CLASS=Big Data-X='Y'></Div>");
    assert_eq!(&*tokens[0].name, "div");
    assert_eq!(tokens[0].param_value("class"), "Big");
    assert_eq!(tokens[0].param_value("data-x"), "Y");
    assert_eq!(&*tokens[1].name, "div");
}

#[test]
fn known_names_share_the_vocabulary_allocation() {
    let vocab = Vocabulary::html();
    let tokens = scan("<TD CLASS=x>");
    let canonical = vocab.canonical_tag("td").unwrap();
    assert!(std::sync::Arc::ptr_eq(&tokens[0].name, canonical));
}

#[test]
fn unknown_names_pass_through() {
    let tokens = scan("<my-widget @click=go v-bind:x=\"1\" disabled></my-widget>");
    assert_eq!(&*tokens[0].name, "my-widget");
    let names: Vec<&str> = tokens[0].params.iter().map(|p| &*p.name).collect();
    assert_eq!(names, vec!["@click", "v-bind:x", "disabled"]);
    assert_eq!(tokens[0].param_value("disabled"), "");
}

#[test]
fn attribute_spacing_and_quotes() {
    let tokens = scan("<input type = \"text\"  value='a b' checked name=q>");
    let params = &tokens[0].params;
    assert_eq!(params.len(), 4);
    assert_eq!(params[0].quote, Quote::Double);
    assert_eq!(params[0].value, "text");
    assert_eq!(params[1].value, "a b");
    assert_eq!(params[1].quote, Quote::Single);
    assert_eq!(params[2].value, "");
    assert_eq!(params[3].quote, Quote::None);
}

#[test]
fn quoted_value_may_contain_markup() {
    let tokens = scan("<a title=\"x > y <z>\">t</a>");
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].param_value("title"), "x > y <z>");
}

#[test]
fn entities_in_text_and_values() {
    let tokens = scan("a &lt;b&gt; &amp; <a title=\"x &amp; y\">&#233;</a>");
    assert_eq!(tokens[0].text, "a <b> & ");
    assert!(tokens[0].flags.had_entities);
    assert!(tokens[0].flags.lt_entity);
    assert_eq!(tokens[1].param_value("title"), "x & y");
    assert!(tokens[1].flags.had_entities);
    assert!(!tokens[1].flags.lt_entity);
    assert_eq!(tokens[2].text, "é");
}

#[test]
fn entity_decoding_can_be_disabled() {
    let config = ScannerConfig {
        decode_entities: false,
        ..ScannerConfig::default()
    };
    let (tokens, _) = scan_with("a &amp; b<a title='&lt;'>", config);
    assert_eq!(tokens[0].text, "a &amp; b");
    assert!(!tokens[0].flags.had_entities);
    assert_eq!(tokens[1].param_value("title"), "&lt;");
}

#[test]
fn comments_and_scripts_are_never_decoded() {
    let tokens = scan("<!-- &amp; --><script>a &amp;&amp; b</script>");
    assert_eq!(tokens[0].text, " &amp; ");
    assert_eq!(tokens[2].text, "a &amp;&amp; b");
}

#[test]
fn raw_spans_tile_the_input() {
    let input = "<p class=a>x &amp; y</p><!-- c --><script>s</script>tail <";
    let config = ScannerConfig {
        keep_raw: true,
        ..ScannerConfig::default()
    };
    let mut scanner = Scanner::new(input, Vocabulary::html(), config);
    let mut rebuilt = String::new();
    while let Some(token) = scanner.next_token() {
        rebuilt.push_str(scanner.raw_text(&token).expect("raw span"));
    }
    assert_eq!(rebuilt, input);
}

#[test]
fn raw_spans_are_absent_by_default() {
    let tokens = scan("<p>x</p>");
    assert!(tokens.iter().all(|token| token.raw.is_none()));
}

#[test]
fn text_limit_splits_long_runs() {
    let input = format!("{}<b>", "a".repeat(40));
    let config = ScannerConfig {
        text_limit: Some(16),
        keep_raw: true,
        ..ScannerConfig::default()
    };
    let (tokens, issues) = scan_with(&input, config);
    let lens: Vec<usize> = tokens.iter().map(|token| token.text.len()).collect();
    assert_eq!(lens, vec![16, 16, 8, 0]);
    assert_eq!(tokens[3].kind, TokenKind::OpenTag);
    assert_eq!(
        issues,
        vec![
            issue(ScanIssueCode::TextLimitExceeded, 16),
            issue(ScanIssueCode::TextLimitExceeded, 32),
        ]
    );
}

#[test]
fn text_limit_never_splits_an_entity() {
    let input = format!("{}&amp;b", "a".repeat(15));
    let config = ScannerConfig {
        text_limit: Some(16),
        ..ScannerConfig::default()
    };
    let (tokens, _) = scan_with(&input, config);
    let texts: Vec<&str> = tokens.iter().map(|token| token.text.as_str()).collect();
    assert_eq!(texts, vec![format!("{}&", "a".repeat(15)).as_str(), "b"]);
}

#[test]
fn unrepresentable_characters_become_substitutes() {
    let config = ScannerConfig {
        encoding: WINDOWS_1252,
        ..ScannerConfig::default()
    };
    let (tokens, issues) = scan_with("café Ж<a title='Ж'>", config);
    assert_eq!(tokens[0].text, "café ?");
    assert_eq!(tokens[1].param_value("title"), "?");
    assert!(issues.is_empty());
}

#[test]
fn strict_encoding_reports_lossy_conversions() {
    let config = ScannerConfig {
        encoding: WINDOWS_1252,
        strict_encoding: true,
        ..ScannerConfig::default()
    };
    let (tokens, issues) = scan_with("a Ж b", config);
    assert_eq!(tokens[0].text, "a ? b");
    assert_eq!(issues, vec![issue(ScanIssueCode::LossyConversion, 2)]);
}

#[test]
fn lossy_conversion_at_text_limit_is_recorded_once() {
    let config = ScannerConfig {
        encoding: WINDOWS_1252,
        strict_encoding: true,
        text_limit: Some(16),
        ..ScannerConfig::default()
    };
    let input = format!("{}Жb", "a".repeat(16));
    let mut scanner = Scanner::new(&input, Vocabulary::html(), config);
    let tokens: Vec<Token> = scanner.by_ref().collect();
    let texts: Vec<&str> = tokens.iter().map(|token| token.text.as_str()).collect();
    assert_eq!(texts, vec!["aaaaaaaaaaaaaaaa", "?b"]);
    assert_eq!(
        scanner.issues(),
        &[
            issue(ScanIssueCode::TextLimitExceeded, 16),
            issue(ScanIssueCode::LossyConversion, 16),
        ]
    );
    assert_eq!(scanner.stats().recoveries, 2);
}

#[test]
fn every_recorded_issue_counts_as_a_recovery() {
    let config = ScannerConfig {
        encoding: WINDOWS_1252,
        strict_encoding: true,
        ..ScannerConfig::default()
    };
    let mut scanner = Scanner::new("<p title=Ж>Ж < x", Vocabulary::html(), config);
    scanner.by_ref().for_each(drop);
    assert_eq!(scanner.issues().len(), 3);
    assert_eq!(scanner.stats().recoveries, 3);
}

#[test]
fn empty_vocabulary_still_scans() {
    let mut scanner = Scanner::new(
        "<DIV id=1>x</DIV>",
        Vocabulary::empty(),
        ScannerConfig::default(),
    );
    let tokens: Vec<Token> = scanner.by_ref().collect();
    assert_eq!(&*tokens[0].name, "div");
    assert_eq!(tokens[0].param_value("id"), "1");
    assert_eq!(tokens.len(), 3);
}

#[test]
fn scanner_is_fused_and_counts() {
    let mut scanner = Scanner::with_defaults("<p>x</p>");
    assert_eq!(scanner.by_ref().count(), 3);
    assert_eq!(scanner.next_token(), None);
    assert_eq!(scanner.next(), None);
    assert_eq!(scanner.position(), 8);
    let ScannerStats { tokens_emitted, .. } = scanner.stats();
    assert_eq!(tokens_emitted, 3);
}

#[test]
fn empty_input_yields_nothing() {
    assert!(scan("").is_empty());
}

#[test]
fn non_ascii_text_around_tags() {
    let tokens = scan("¡Hola <b>café</b> 😊");
    let texts: Vec<&str> = tokens
        .iter()
        .filter(|token| token.kind == TokenKind::Text)
        .map(|token| token.text.as_str())
        .collect();
    assert_eq!(texts, vec!["¡Hola ", "café", " 😊"]);
}

#[test]
fn tokens_are_independent_values() {
    let mut scanner = Scanner::with_defaults("<p class=a><p class=b>");
    let first = scanner.next_token().unwrap();
    let second = scanner.next_token().unwrap();
    assert_eq!(first.param_value("class"), "a");
    assert_eq!(second.param_value("class"), "b");
}

#[cfg(feature = "perf-tests")]
fn measure_total(input: &str) -> std::time::Duration {
    use std::time::{Duration, Instant};
    let _ = Scanner::with_defaults(input).count();
    let mut total = Duration::ZERO;
    for _ in 0..5 {
        let start = Instant::now();
        let _ = Scanner::with_defaults(input).count();
        total += start.elapsed();
    }
    total
}

#[cfg(feature = "perf-tests")]
#[test]
fn scan_scales_roughly_linearly_on_repeated_tags() {
    let small = "<a href=x></a>".repeat(5_000);
    let large = "<a href=x></a>".repeat(20_000);

    let t_small = measure_total(&small);
    let t_large = measure_total(&large);
    assert!(!t_small.is_zero(), "timer resolution too coarse for test");
    // Generous slack; catches quadratic regressions only.
    assert!(
        t_large <= t_small.saturating_mul(12),
        "expected near-linear scaling; t_small={t_small:?} t_large={t_large:?}"
    );
}

#[cfg(feature = "perf-tests")]
#[test]
fn scan_scales_roughly_linearly_on_broken_tags() {
    let small = "x<a b <p c='".repeat(2_000);
    let large = "x<a b <p c='".repeat(8_000);

    let t_small = measure_total(&small);
    let t_large = measure_total(&large);
    assert!(!t_small.is_zero(), "timer resolution too coarse for test");
    assert!(
        t_large <= t_small.saturating_mul(12),
        "expected near-linear recovery; t_small={t_small:?} t_large={t_large:?}"
    );
}
