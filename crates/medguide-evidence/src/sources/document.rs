use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use medguide_core::BoxFuture;
use medguide_core::models::evidence::{EvidenceItem, Grade, Locator, SourceKind};
use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::error::EvidenceError;
use crate::filters::EvidenceFilters;
use crate::schema::{build_schema, field, get_field};
use crate::source::EvidenceSource;

const WRITER_MEMORY_BYTES: usize = 50_000_000;
const MAX_CANDIDATES: usize = 256;

/// One page of a guideline, pre-tagged with canonical term codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelinePassage {
    pub document: String,
    pub page: u32,
    pub title: String,
    pub body: String,
    pub grade: Grade,
    #[serde(default)]
    pub published_at: Option<jiff::Timestamp>,
    pub terms: Vec<String>,
}

impl GuidelinePassage {
    pub fn load_all(path: &Path) -> Result<Vec<Self>, EvidenceError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn id(&self) -> String {
        passage_id(&self.document, self.page)
    }
}

fn passage_id(document: &str, page: u32) -> String {
    format!("{document}#{page}")
}

/// Guideline passages behind a tantivy index. Refreshing swaps the whole
/// index, so a query sees either the old or the new snapshot.
pub struct DocumentSource {
    name: String,
    index: RwLock<Arc<Index>>,
}

impl DocumentSource {
    pub fn in_memory(
        name: impl Into<String>,
        passages: &[GuidelinePassage],
    ) -> Result<Self, EvidenceError> {
        let index = build_ram_index(passages)?;
        Ok(Self {
            name: name.into(),
            index: RwLock::new(Arc::new(index)),
        })
    }

    pub fn open_in_dir(name: impl Into<String>, dir: &Path) -> Result<Self, EvidenceError> {
        let index =
            Index::open_in_dir(dir).map_err(|e| EvidenceError::IndexCorrupted(e.to_string()))?;
        let name = name.into();
        info!(source = %name, dir = %dir.display(), "opened guideline index");
        Ok(Self {
            name,
            index: RwLock::new(Arc::new(index)),
        })
    }

    /// Writes a fresh index into `dir`, which must be empty.
    pub fn create_in_dir(
        name: impl Into<String>,
        dir: &Path,
        passages: &[GuidelinePassage],
    ) -> Result<Self, EvidenceError> {
        let index = Index::create_in_dir(dir, build_schema())?;
        write_passages(&index, passages)?;
        Ok(Self {
            name: name.into(),
            index: RwLock::new(Arc::new(index)),
        })
    }

    /// Replaces the served snapshot with a new in-memory index.
    pub fn refresh(&self, passages: &[GuidelinePassage]) -> Result<(), EvidenceError> {
        let fresh = Arc::new(build_ram_index(passages)?);
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        info!(source = %self.name, passages = passages.len(), "guideline index refreshed");
        Ok(())
    }

    fn snapshot(&self) -> Arc<Index> {
        Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn search(
        &self,
        terms: &[String],
        filters: &EvidenceFilters,
    ) -> Result<Vec<EvidenceItem>, EvidenceError> {
        if terms.is_empty() || !filters.allows_kind(SourceKind::Document) {
            return Ok(Vec::new());
        }

        let index = self.snapshot();
        let schema = index.schema();
        let terms_field = get_field(&schema, field::TERMS);

        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|code| {
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(terms_field, code),
                    IndexRecordOption::Basic,
                ));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let items = collect(&index, &query)?;
        debug!(source = %self.name, terms = terms.len(), hits = items.len(), "guideline query");
        Ok(filters.apply(items))
    }

    fn find(&self, document: &str, page: u32) -> Result<Option<EvidenceItem>, EvidenceError> {
        let index = self.snapshot();
        let schema = index.schema();
        let id_field = get_field(&schema, field::ID);
        let query = TermQuery::new(
            Term::from_field_text(id_field, &passage_id(document, page)),
            IndexRecordOption::Basic,
        );
        Ok(collect(&index, &query)?.into_iter().next())
    }

    fn list_since(&self, since: jiff::Timestamp) -> Result<Vec<EvidenceItem>, EvidenceError> {
        let index = self.snapshot();
        let mut items: Vec<EvidenceItem> = collect(&index, &AllQuery)?
            .into_iter()
            .filter(|item| item.recency_timestamp().is_some_and(|at| at >= since))
            .collect();
        items.sort_by(|a, b| b.recency_timestamp().cmp(&a.recency_timestamp()));
        Ok(items)
    }
}

impl EvidenceSource for DocumentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Document
    }

    fn query<'a>(
        &'a self,
        terms: &'a [String],
        filters: &'a EvidenceFilters,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move { self.search(terms, filters) })
    }

    fn resolve<'a>(
        &'a self,
        locator: &'a Locator,
    ) -> BoxFuture<'a, Result<Option<EvidenceItem>, EvidenceError>> {
        Box::pin(async move {
            match locator {
                Locator::Document { document, page } => self.find(document, *page),
                _ => Ok(None),
            }
        })
    }

    fn updated_since<'a>(
        &'a self,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<EvidenceItem>, EvidenceError>> {
        Box::pin(async move { self.list_since(since) })
    }
}

fn build_ram_index(passages: &[GuidelinePassage]) -> Result<Index, EvidenceError> {
    let index = Index::create_in_ram(build_schema());
    write_passages(&index, passages)?;
    Ok(index)
}

fn write_passages(index: &Index, passages: &[GuidelinePassage]) -> Result<(), EvidenceError> {
    let schema = index.schema();
    let id_field = get_field(&schema, field::ID);
    let document_field = get_field(&schema, field::DOCUMENT);
    let page_field = get_field(&schema, field::PAGE);
    let title_field = get_field(&schema, field::TITLE);
    let body_field = get_field(&schema, field::BODY);
    let terms_field = get_field(&schema, field::TERMS);
    let grade_field = get_field(&schema, field::GRADE);
    let published_field = get_field(&schema, field::PUBLISHED_AT);

    let mut writer: IndexWriter = index.writer(WRITER_MEMORY_BYTES)?;
    for passage in passages {
        let mut doc = TantivyDocument::default();
        doc.add_text(id_field, passage.id());
        doc.add_text(document_field, &passage.document);
        doc.add_u64(page_field, u64::from(passage.page));
        doc.add_text(title_field, &passage.title);
        doc.add_text(body_field, &passage.body);
        for code in &passage.terms {
            doc.add_text(terms_field, code);
        }
        doc.add_text(grade_field, passage.grade.as_str());
        if let Some(at) = passage.published_at {
            doc.add_i64(published_field, at.as_second());
        }
        writer.add_document(doc)?;
    }
    writer.commit()?;
    Ok(())
}

fn collect(index: &Index, query: &dyn Query) -> Result<Vec<EvidenceItem>, EvidenceError> {
    let reader = index.reader()?;
    let searcher = reader.searcher();
    let schema = index.schema();

    let document_field = get_field(&schema, field::DOCUMENT);
    let page_field = get_field(&schema, field::PAGE);
    let title_field = get_field(&schema, field::TITLE);
    let body_field = get_field(&schema, field::BODY);
    let terms_field = get_field(&schema, field::TERMS);
    let grade_field = get_field(&schema, field::GRADE);
    let published_field = get_field(&schema, field::PUBLISHED_AT);

    let top_docs = searcher.search(query, &TopDocs::with_limit(MAX_CANDIDATES))?;

    let mut items = Vec::with_capacity(top_docs.len());
    for (score, doc_address) in top_docs {
        let doc = searcher.doc::<TantivyDocument>(doc_address)?;

        let document = doc
            .get_first(document_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let page = doc
            .get_first(page_field)
            .and_then(|v| v.as_u64())
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or_default();
        let title = doc
            .get_first(title_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body = doc
            .get_first(body_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let raw_grade = doc
            .get_first(grade_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let grade = raw_grade.parse().unwrap_or_else(|_| {
            warn!(document = %document, page, grade = raw_grade, "unrecognised grade");
            Grade::Ungraded
        });
        let terms: Vec<String> = doc
            .get_all(terms_field)
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect();
        let published = doc
            .get_first(published_field)
            .and_then(|v| v.as_i64())
            .and_then(|secs| jiff::Timestamp::from_second(secs).ok());

        let mut item = EvidenceItem::new(body, Locator::Document { document, page }, grade)
            .with_title(title)
            .with_relevance(score)
            .with_terms(terms);
        if let Some(at) = published {
            item = item.with_recency(at);
        }
        items.push(item);
    }
    Ok(items)
}
