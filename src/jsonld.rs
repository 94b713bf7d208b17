//! JSON-LD to RDF conversion.
//!
//! Expansion and RDF serialization are done by the `json-ld` crate. Remote
//! contexts are requested from a [`Loader`] only when processing reaches
//! them, and the loader's error is kept as the source of the failure.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use iref::IriBuf;
use json_ld::{JsonLdProcessor, Options, RemoteDocument, ValidId};
use json_syntax::Parse;
use locspan::Span;
use rdf_types::IriVocabularyMut;
use serde_json::Value;

use crate::error::Error;
use crate::rdf::{
    BlankNodeLabel, DataSet, GraphLabel, IRIRef, Lang, Literal, Object, Predicate, Statement,
    StringLiteral, Subject, XSD_STRING,
};

pub const AT_CONTEXT: &str = "@context";
pub const AT_IMPORT: &str = "@import";

/// Source of remote context documents.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the document at `url`; the document is expected to hold the
    /// context under `@context`.
    async fn load(&self, url: &str) -> Result<Value, Error>;
}

#[derive(Debug, thiserror::Error)]
#[error("Remote context not available: {0}")]
pub struct ContextUnavailable(String);

/// [`Loader`] seen through the `json-ld` crate's loader interface. The first
/// failed load is kept so it can be reported with its own error.
struct ContextDocuments<'l> {
    loader: &'l dyn Loader,
    failure: Option<(String, Error)>,
}

impl json_ld::Loader<IriBuf, Span> for ContextDocuments<'_> {
    type Output = json_syntax::Value<Span>;
    type Error = ContextUnavailable;

    fn load_with<'a>(
        &'a mut self,
        _vocabulary: &'a mut (impl Sync + Send + IriVocabularyMut<Iri = IriBuf>),
        url: IriBuf,
    ) -> BoxFuture<'a, json_ld::LoadingResult<IriBuf, Span, Self::Output, Self::Error>>
    where
        IriBuf: 'a,
    {
        async move {
            let loaded = match self.loader.load(url.as_str()).await {
                Ok(document) => parse_json(&document),
                Err(e) => Err(e),
            };
            match loaded {
                Ok(json) => Ok(RemoteDocument::new(Some(url), None, json)),
                Err(e) => {
                    log::debug!("context {} not loaded: {}", url.as_str(), e);
                    if self.failure.is_none() {
                        self.failure = Some((url.as_str().to_string(), e));
                    }
                    Err(ContextUnavailable(url.as_str().to_string()))
                }
            }
        }
        .boxed()
    }
}

fn parse_json(value: &Value) -> Result<locspan::Meta<json_syntax::Value<Span>, Span>, Error> {
    let text = serde_json::to_string(value)?;
    json_syntax::Value::parse_str(&text, |span| span)
        .map_err(|e| Error::Canonicalization(format!("invalid JSON: {}", e)))
}

/// Collect context URLs: strings in `@context` values, `@import` values and
/// the same in scoped contexts of term definitions.
fn collect_context_urls(value: &Value, in_context: bool, out: &mut BTreeSet<String>) {
    match value {
        Value::String(url) if in_context => {
            out.insert(url.clone());
        }
        Value::Array(items) => {
            for item in items {
                collect_context_urls(item, in_context, out);
            }
        }
        Value::Object(object) => {
            for (key, value) in object {
                match key.as_str() {
                    AT_CONTEXT => collect_context_urls(value, true, out),
                    AT_IMPORT if in_context => {
                        if let Some(url) = value.as_str() {
                            out.insert(url.to_string());
                        }
                    }
                    _ => collect_context_urls(value, false, out),
                }
            }
        }
        _ => {}
    }
}

/// Context URLs a document references at its top level.
pub fn top_level_context_urls(document: &Value) -> Vec<String> {
    let mut urls = BTreeSet::new();
    if let Some(context) = document.get(AT_CONTEXT) {
        collect_context_urls(context, true, &mut urls);
    }
    urls.into_iter().collect()
}

fn subject(id: ValidId<IriBuf, rdf_types::BlankIdBuf>) -> Subject {
    match id {
        ValidId::Iri(iri) => Subject::IRIRef(IRIRef(iri.as_str().to_string())),
        ValidId::Blank(blank) => Subject::BlankNodeLabel(BlankNodeLabel(blank.as_str().to_string())),
    }
}

fn graph_label(id: ValidId<IriBuf, rdf_types::BlankIdBuf>) -> GraphLabel {
    match id {
        ValidId::Iri(iri) => GraphLabel::IRIRef(IRIRef(iri.as_str().to_string())),
        ValidId::Blank(blank) => {
            GraphLabel::BlankNodeLabel(BlankNodeLabel(blank.as_str().to_string()))
        }
    }
}

/// Convert a JSON-LD document to an RDF dataset.
///
/// Expansion uses the strict policy: a property that does not expand to an
/// IRI is an error rather than being dropped, so claims outside the
/// document's contexts cannot ride along unsigned.
pub async fn to_dataset(document: &Value, loader: &dyn Loader) -> Result<DataSet, Error> {
    let json = parse_json(document)?;
    let mut contexts = ContextDocuments {
        loader,
        failure: None,
    };
    let options: Options<IriBuf, Span> = Options {
        expansion_policy: json_ld::expansion::Policy::Strict,
        ..Default::default()
    };
    let doc = RemoteDocument::new(None, None, json);
    let mut generator =
        rdf_types::generator::Blank::new_with_prefix("b".to_string()).with_default_metadata();
    let result = match doc.to_rdf_using(&mut generator, &mut contexts, options).await {
        Ok(mut to_rdf) => Ok(to_rdf
            .cloned_quads()
            .filter_map(|rdf_types::Quad(s, p, o, g)| {
                // Generalized RDF is off, so predicates are IRIs.
                let predicate = match p {
                    ValidId::Iri(iri) => Predicate::iri(iri.as_str()),
                    ValidId::Blank(_) => return None,
                };
                let object = match o {
                    rdf_types::Term::Iri(iri) => Object::from(subject(ValidId::Iri(iri))),
                    rdf_types::Term::Blank(blank) => Object::from(subject(ValidId::Blank(blank))),
                    rdf_types::Term::Literal(literal) => Object::Literal(match literal {
                        rdf_types::Literal::String(string) => Literal::String {
                            string: StringLiteral(string.as_str().to_string()),
                        },
                        rdf_types::Literal::TypedString(string, type_)
                            if type_.as_str() == XSD_STRING =>
                        {
                            Literal::String {
                                string: StringLiteral(string.as_str().to_string()),
                            }
                        }
                        rdf_types::Literal::TypedString(string, type_) => Literal::Typed {
                            string: StringLiteral(string.as_str().to_string()),
                            type_: IRIRef(type_.as_str().to_string()),
                        },
                        rdf_types::Literal::LangString(string, lang) => Literal::LangTagged {
                            string: StringLiteral(string.as_str().to_string()),
                            lang: Lang(lang.as_str().to_string()),
                        },
                    }),
                };
                Some(Statement {
                    subject: subject(s),
                    predicate,
                    object,
                    graph_label: g.map(graph_label),
                })
            })
            .collect::<Vec<Statement>>()),
        Err(e) => Err(e.to_string()),
    };
    match result {
        Ok(statements) => {
            let mut dataset = DataSet::default();
            for statement in statements {
                dataset.add_statement(statement);
            }
            Ok(dataset)
        }
        Err(message) => Err(match contexts.failure.take() {
            Some((url, source)) => Error::ContextLoad {
                url,
                source: Box::new(source),
            },
            None => Error::Canonicalization(message),
        }),
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::test_util::StaticLoader;
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_nested_context_urls() {
        let context = json!({
            "@context": [
                "https://example.org/a",
                {
                    "@import": "https://example.org/b",
                    "term": {
                        "@id": "https://example.org/term",
                        "@context": "https://example.org/c"
                    },
                    "plain": "https://example.org/not-a-context"
                }
            ],
            "nested": { "@context": { "@vocab": "https://example.org/vocab#" } }
        });
        let mut urls = BTreeSet::new();
        collect_context_urls(&context, false, &mut urls);
        let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        assert_eq!(
            urls,
            [
                "https://example.org/a",
                "https://example.org/b",
                "https://example.org/c"
            ]
        );
        assert_eq!(
            top_level_context_urls(&context),
            ["https://example.org/a", "https://example.org/b", "https://example.org/c"]
        );
    }

    #[async_std::test]
    async fn remote_context_terms() {
        let loader = StaticLoader(
            [(
                "https://example.org/ctx".to_string(),
                json!({ "@context": { "name": "https://schema.org/name" } }),
            )]
            .into(),
        );
        let doc = json!({
            "@context": "https://example.org/ctx",
            "@id": "urn:example:s",
            "name": "Alice"
        });
        let nquads = to_dataset(&doc, &loader).await.unwrap().to_nquads().unwrap();
        assert_eq!(nquads, "<urn:example:s> <https://schema.org/name> \"Alice\" .\n");
    }

    #[async_std::test]
    async fn undefined_term_is_rejected() {
        let loader = StaticLoader::default();
        let doc = json!({
            "@context": { "name": "https://schema.org/name" },
            "@id": "urn:example:s",
            "name": "Alice",
            "role": "administrator"
        });
        match to_dataset(&doc, &loader).await {
            Err(Error::Canonicalization(_)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[async_std::test]
    async fn missing_context_fails_only_when_reached() {
        let loader = StaticLoader(HashMap::new());
        let doc = json!({
            "@context": { "name": "https://schema.org/name" },
            "@id": "https://example.org/s",
            "name": "Alice"
        });
        assert!(to_dataset(&doc, &loader).await.is_ok());

        let doc = json!({
            "@context": "https://example.org/missing",
            "@id": "https://example.org/s"
        });
        let err = to_dataset(&doc, &loader).await.unwrap_err();
        assert!(err.is_offline_missing());
        match err {
            Error::ContextLoad { url, .. } => assert_eq!(url, "https://example.org/missing"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
