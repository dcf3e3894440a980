use criterion::{Criterion, criterion_group, criterion_main};
use pdf_rag::document::Document;
use pdf_rag::embeddings::{ChunkingConfig, chunk_documents, split_text};
use std::hint::black_box;

/// Roughly a 40 page report: paragraphs of short sentences, one page each
fn report_pages() -> Vec<Document> {
    (1..=40)
        .map(|page| {
            let text = (1..=12)
                .map(|paragraph| {
                    (1..=6)
                        .map(|sentence| {
                            format!(
                                "Finding {page}.{paragraph}.{sentence} notes that regional output rose while costs held steady."
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join("\n\n");
            Document::new(text, "report.pdf", page)
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let pages = report_pages();
    let config = ChunkingConfig::default();
    c.bench_function("chunk_documents", |b| {
        b.iter(|| chunk_documents(black_box(&pages), black_box(&config)))
    });

    let unbroken = "lorem".repeat(20_000);
    c.bench_function("split_text_hard_cuts", |b| {
        b.iter(|| split_text(black_box(&unbroken), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
