use super::*;
use std::path::Path;

fn sample_text() -> String {
    let mut text = String::new();
    for paragraph in 0..12 {
        for sentence in 0..6 {
            text.push_str(&format!(
                "Paragraph {} sentence {} talks about retrieval and the overlapping windows it uses. ",
                paragraph, sentence
            ));
        }
        text.push_str("\n\n");
    }
    text.push_str("Closing line without a trailing newline");
    text
}

/// Drop each span's overlap with its predecessor and concatenate
fn reconstruct(text: &str, spans: &[TextSpan]) -> String {
    let mut rebuilt = String::new();
    let mut covered = 0;

    for span in spans {
        assert!(
            span.start <= covered,
            "gap between {} and {}",
            covered,
            span.start
        );
        assert!(
            span.end > covered || covered == 0,
            "span {:?} ends at or before {}",
            span,
            covered
        );
        let fresh = TextSpan {
            start: covered.max(span.start),
            end: span.end,
        };
        rebuilt.push_str(fresh.slice(text));
        covered = span.end;
    }

    rebuilt
}

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

#[test]
fn default_config_values() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 800);
    assert_eq!(config.chunk_overlap, 100);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    assert!(config(0, 0).validate().is_err());
    assert!(config(100, 100).validate().is_err());
    assert!(config(100, 150).validate().is_err());
    assert!(config(100, 99).validate().is_ok());
    assert!(config(1, 0).validate().is_ok());
}

#[test]
fn empty_text_has_no_chunks() {
    assert!(split_text("", &ChunkingConfig::default()).is_empty());
    assert!(chunk_documents(&[], &ChunkingConfig::default()).is_empty());
}

#[test]
fn short_text_is_single_chunk() {
    let text = "A short page.";
    let spans = split_text(text, &ChunkingConfig::default());

    assert_eq!(spans, vec![TextSpan { start: 0, end: text.len() }]);
}

#[test]
fn chunking_is_deterministic() {
    let text = sample_text();
    let config = ChunkingConfig::default();

    assert_eq!(split_text(&text, &config), split_text(&text, &config));
}

#[test]
fn chunks_respect_max_size() {
    let text = sample_text();

    for cfg in [config(800, 100), config(120, 30), config(37, 5), config(5, 4)] {
        let spans = split_text(&text, &cfg);
        assert!(spans.len() > 1);
        for span in &spans {
            let chars = span.slice(&text).chars().count();
            assert!(
                chars <= cfg.chunk_size,
                "chunk of {} chars exceeds {}",
                chars,
                cfg.chunk_size
            );
        }
    }
}

#[test]
fn overlap_removed_reconstructs_text() {
    let texts = [
        sample_text(),
        "x".repeat(2_345),
        "héllo wörld ünïcode ✓ 文字 ".repeat(150),
        "line one\nline two\nline three\n".repeat(90),
        "   leading and trailing whitespace   \n\n\n".repeat(40),
    ];
    let configs = [
        config(800, 100),
        config(100, 0),
        config(64, 63),
        config(10, 3),
        config(1, 0),
    ];

    for text in &texts {
        for cfg in &configs {
            let spans = split_text(text, cfg);
            assert_eq!(&reconstruct(text, &spans), text);
        }
    }
}

#[test]
fn consecutive_chunks_overlap_within_limit() {
    let text = sample_text();
    let cfg = config(200, 40);
    let spans = split_text(&text, &cfg);

    for pair in spans.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        assert!(next.start > prev.start);
        assert!(next.start <= prev.end);

        let shared = TextSpan {
            start: next.start,
            end: prev.end,
        };
        let overlap_chars = shared.slice(&text).chars().count();
        assert!(overlap_chars <= cfg.chunk_overlap);
    }

    assert!(
        spans.windows(2).any(|pair| pair[1].start < pair[0].end),
        "prose should produce real overlap"
    );
}

#[test]
fn large_overlap_still_advances() {
    let text = sample_text();

    for size in (20..120).step_by(7) {
        for overlap in size / 2..size {
            let cfg = config(size, overlap);
            let spans = split_text(&text, &cfg);

            for pair in spans.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                assert!(
                    next.end > prev.end,
                    "{:?} does not advance past {:?} with size {} overlap {}",
                    next,
                    prev,
                    size,
                    overlap
                );
                let shared = TextSpan {
                    start: next.start,
                    end: prev.end,
                };
                assert!(shared.slice(&text).chars().count() <= overlap);
            }
            assert_eq!(reconstruct(&text, &spans), text);
        }
    }
}

#[test]
fn hard_cut_without_whitespace() {
    let text = "x".repeat(2_000);
    let spans = split_text(&text, &config(800, 100));

    assert_eq!(
        spans,
        vec![
            TextSpan { start: 0, end: 800 },
            TextSpan {
                start: 700,
                end: 1_500
            },
            TextSpan {
                start: 1_400,
                end: 2_000
            },
        ]
    );
}

#[test]
fn prefers_paragraph_boundary() {
    let first = "alpha ".repeat(100);
    let text = format!("{}\n\n{}", first.trim_end(), "beta ".repeat(100));
    let spans = split_text(&text, &config(800, 100));

    let first_chunk = spans[0].slice(&text);
    assert!(first_chunk.ends_with("\n\n"));
    assert_eq!(first_chunk.trim_end(), first.trim_end());

    let second_chunk = spans[1].slice(&text);
    assert!(second_chunk.starts_with("alpha"));
}

#[test]
fn prefers_sentence_over_word_boundary() {
    let text = "This sentence is one of many in a very long run of prose. ".repeat(40);
    let spans = split_text(&text, &config(300, 50));

    for span in &spans[..spans.len() - 1] {
        assert!(
            span.slice(&text).trim_end().ends_with('.'),
            "chunk should end at a sentence: {:?}",
            span.slice(&text)
        );
    }
}

#[test]
fn overlap_starts_on_word() {
    let text = "word ".repeat(500);
    let spans = split_text(&text, &config(120, 30));

    for span in &spans[1..] {
        assert!(span.slice(&text).starts_with("word"));
    }
}

#[test]
fn chunk_documents_tracks_pages_and_offsets() {
    let documents = vec![
        Document::new("First page text.", "report.pdf", 1),
        Document::new(sample_text(), "report.pdf", 2),
        Document::new("Last page.", "report.pdf", 3),
    ];
    let chunks = chunk_documents(&documents, &config(200, 40));

    assert!(chunks.len() > 3);
    assert_eq!(chunks[0].page, 1);
    assert_eq!(chunks[0].text, "First page text.");
    assert_eq!(chunks.last().map(|c| c.page), Some(3));

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.source, Path::new("report.pdf"));

        let page_text = &documents[(chunk.page - 1) as usize].text;
        let span = TextSpan {
            start: chunk.start_offset,
            end: chunk.start_offset + chunk.text.len(),
        };
        assert_eq!(span.slice(page_text), chunk.text);
    }

    let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
    let mut sorted = pages.clone();
    sorted.sort_unstable();
    assert_eq!(pages, sorted);
}
