use serde::{Deserialize, Serialize};

use crate::weight::inverse_document_freq;

/// Opaque, unique document key. Ordering on it breaks ranking ties.
pub type DocId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<DocId>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), body: body.into(), tags: Vec::new() }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Title, body and every tag joined by single spaces.
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.body.len() + 1);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.body);
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text
    }
}

/// Corpus-wide document frequency of one term.
///
/// `total_documents_containing_term` is at least 1 while the record exists,
/// and `idf` always matches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStatistic {
    pub term: String,
    pub total_documents_containing_term: u64,
    pub idf: f64,
}

impl TermStatistic {
    /// Record for a term seen in its first document.
    pub fn first(term: impl Into<String>, total_documents: u64) -> Self {
        Self::with_count(term.into(), 1, total_documents)
    }

    pub fn incremented(&self, total_documents: u64) -> Self {
        Self::with_count(self.term.clone(), self.total_documents_containing_term + 1, total_documents)
    }

    /// `None` when the last document containing the term is gone.
    pub fn decremented(&self, total_documents: u64) -> Option<Self> {
        match self.total_documents_containing_term {
            0 | 1 => None,
            n => Some(Self::with_count(self.term.clone(), n - 1, total_documents)),
        }
    }

    fn with_count(term: String, containing: u64, total_documents: u64) -> Self {
        let idf = inverse_document_freq(containing, total_documents);
        Self { term, total_documents_containing_term: containing, idf }
    }
}

/// Weight of one term inside one document, frozen at indexing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub term: String,
    pub document_id: DocId,
    pub tf: f64,
    pub tf_idf: f64,
}

/// Per-query ranking record.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub document_id: DocId,
    pub cosine: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_title_body_and_tags() {
        let doc = Document::new("a", "Title", "body text").with_tags(["x", "y"]);
        assert_eq!(doc.text(), "Title body text x y");
    }

    #[test]
    fn statistic_transitions_recompute_idf() {
        let first = TermStatistic::first("cat", 4);
        assert_eq!(first.total_documents_containing_term, 1);
        assert!((first.idf - 4f64.ln()).abs() < 1e-12);

        let second = first.incremented(4);
        assert_eq!(second.total_documents_containing_term, 2);
        assert!((second.idf - 2f64.ln()).abs() < 1e-12);

        let back = second.decremented(4).unwrap();
        assert_eq!(back, TermStatistic::first("cat", 4));
        assert!(back.decremented(4).is_none());
    }

    #[test]
    fn document_accepts_content_alias() {
        let doc: Document = serde_json::from_str(r#"{"id":"1","title":"t","content":"c"}"#).unwrap();
        assert_eq!(doc.body, "c");
        assert!(doc.tags.is_empty());
    }
}
