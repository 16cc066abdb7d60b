use serde_json::json;
use termlight_rs::highlight::{annotated_count, pool_matches, select_matches};
use termlight_rs::{
    SavedTermStore, Span, TermRecord, highlight, parse_response, render_html,
};

fn record(term: &str, definition: &str) -> TermRecord {
    TermRecord::new(term, definition, Some("技术")).expect("valid record")
}

fn cases() -> Vec<(&'static str, Vec<TermRecord>)> {
    vec![
        ("", vec![record("AI", "人工智能")]),
        ("no terms here", vec![]),
        ("AI安全领域的 AI 研究", vec![record("AI", "人工智能"), record("AI安全", "人工智能安全")]),
        ("ABABABA", vec![record("ABA", "a"), record("BAB", "b")]),
        ("aaaa", vec![record("a", "x"), record("aa", "y"), record("aaa", "z")]),
        (
            "deep learning rate schedules",
            vec![record("learning rate", "学习率"), record("deep learning", "深度学习")],
        ),
        ("模型 模型模型", vec![record("模型", "model")]),
        ("GPU", vec![record("GPU", "图形处理器")]),
        ("emoji 🚀 launch 🚀", vec![record("🚀", "rocket"), record("launch", "发射")]),
    ]
}

#[test]
fn spans_partition_every_input() {
    for (text, terms) in cases() {
        let spans = highlight(text, &terms);
        assert!(!spans.is_empty(), "no spans for {text:?}");
        assert_eq!(spans[0].start(), 0, "{text:?}");
        assert_eq!(spans[spans.len() - 1].end(), text.len(), "{text:?}");
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start(), "{text:?}");
        }
        let rebuilt: String = spans.iter().map(Span::text).collect();
        assert_eq!(rebuilt, text);
    }
}

#[test]
fn span_text_matches_source_slice() {
    for (text, terms) in cases() {
        for span in highlight(text, &terms) {
            assert_eq!(span.text(), &text[span.start()..span.end()]);
            if let Span::Annotated { text: covered, .. } = &span {
                assert!(
                    terms.iter().any(|term| term.term == *covered),
                    "{covered:?} is not one of the terms"
                );
            }
        }
    }
}

#[test]
fn accepted_matches_never_overlap() {
    for (text, terms) in cases() {
        let accepted = select_matches(pool_matches(text, &terms));
        for pair in accepted.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{text:?}");
        }
    }
}

#[test]
fn literal_spans_are_never_empty_unless_text_is() {
    for (text, terms) in cases() {
        let spans = highlight(text, &terms);
        if text.is_empty() {
            assert_eq!(spans.len(), 1);
            continue;
        }
        assert!(spans.iter().all(|span| span.start() < span.end()), "{text:?}");
    }
}

#[test]
fn greedy_prefers_longest_at_each_start() {
    let terms = vec![record("a", "x"), record("aa", "y"), record("aaa", "z")];
    let spans = highlight("aaaa", &terms);
    let texts: Vec<_> = spans.iter().map(Span::text).collect();
    assert_eq!(texts, vec!["aaa", "a"]);
    assert_eq!(annotated_count(&spans), 2);
}

#[test]
fn model_reply_flows_into_html() {
    let envelope = json!({
        "choices": [{
            "message": {
                "content": "结果如下 {\"terms\":[{\"term\":\"<script>\",\"definition\":\"a \\\"tag\\\"\"}]}"
            }
        }]
    });
    let terms = parse_response(&envelope);
    assert_eq!(terms.len(), 1);
    let html = render_html(&highlight("x <script> y", &terms));
    assert_eq!(
        html,
        "x <span class=\"term\" data-term=\"&lt;script&gt;\" \
         data-definition=\"a &quot;tag&quot;\" data-category=\"其他\">&lt;script&gt;</span> y"
    );
}

#[test]
fn saved_terms_survive_a_round_trip_through_highlighting() {
    let mut store = SavedTermStore::new();
    store.add(record("LLM", "大型语言模型"));
    store.add(record("RAG", "检索增强生成"));
    let restored = SavedTermStore::load_from_serialized(&store.serialize()).expect("decodes");
    let terms: Vec<TermRecord> = restored.iter().cloned().collect();
    let spans = highlight("LLM 与 RAG", &terms);
    assert_eq!(annotated_count(&spans), 2);
}
