// Shared fakes for integration tests: deterministic offline backends

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::cell::RefCell;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use pdf_rag::embeddings::Embedder;
use pdf_rag::generation::{FALLBACK_ANSWER, Generator};
use pdf_rag::{RagError, Result};

const DIMENSIONS: usize = 512;

const STOPWORDS: [&str; 18] = [
    "the", "and", "does", "did", "what", "when", "where", "who", "why", "how", "this", "that",
    "for", "with", "are", "was", "which", "about",
];

/// Lowercased content words, cut to their first five letters so that
/// "expires" and "expire" compare equal
pub fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= 3 && !STOPWORDS.contains(&word.as_str()))
        .map(|word| word.chars().take(5).collect())
        .collect()
}

/// Bag of keywords. Each new keyword gets the next free dimension, so two
/// texts only overlap when they share a keyword.
#[derive(Default)]
pub struct KeywordEmbedder {
    vocabulary: RefCell<Vec<String>>,
}

impl KeywordEmbedder {
    fn dimension_of(&self, word: String) -> Option<usize> {
        let mut vocabulary = self.vocabulary.borrow_mut();
        if let Some(position) = vocabulary.iter().position(|known| *known == word) {
            return Some(position);
        }
        if vocabulary.len() == DIMENSIONS {
            return None;
        }
        vocabulary.push(word);
        Some(vocabulary.len() - 1)
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; DIMENSIONS];
                for dimension in keywords(text).into_iter().filter_map(|w| self.dimension_of(w)) {
                    vector[dimension] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn model(&self) -> &str {
        "keyword-bag"
    }
}

/// Fails like an embedding server that is not running
pub struct UnreachableEmbedder;

impl Embedder for UnreachableEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Backend(
            "Could not reach http://localhost:11434/api/embed: Connection refused".to_string(),
        ))
    }

    fn model(&self) -> &str {
        "keyword-bag"
    }
}

/// Answers with the context sentence sharing the most keywords with the
/// question, or the fallback sentence when none share any
pub struct ExtractiveGenerator;

impl Generator for ExtractiveGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let context = section(prompt, "CONTEXT:\n", "\n\nQUESTION:\n");
        let question = section(prompt, "QUESTION:\n", "\n\nIf the answer");
        let wanted = keywords(question);

        let best = context
            .split_inclusive(". ")
            .map(str::trim)
            .map(|sentence| {
                let found = keywords(sentence);
                let score = wanted.iter().filter(|w| found.contains(w)).count();
                (score, sentence)
            })
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score);

        Ok(best.map_or_else(|| FALLBACK_ANSWER.to_string(), |(_, s)| s.to_string()))
    }

    fn model(&self) -> &str {
        "extractive"
    }
}

fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
    let Some((_, rest)) = prompt.split_once(start) else {
        return "";
    };
    rest.split_once(end).map_or(rest, |(inner, _)| inner)
}

/// Write a PDF with one text line per entry in `pages`, one page each
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count fits");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).expect("pdf saves");
}
