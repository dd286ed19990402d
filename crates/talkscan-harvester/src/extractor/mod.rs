//! Candidate extraction from the live DOM.
//!
//! Every call re-reads the page from scratch. Each content block is read
//! with the profile's strategies in order and the first strategy producing
//! an author or a body wins. Blocks on which every strategy comes up empty
//! are skipped, never fatal.

pub(crate) mod block_text;

use std::collections::HashSet;

use talkscan_core::{Platform, Record, RecordKind};

use crate::dedup::derive_identity;
use crate::error::HarvestError;
use crate::platform::{BlockProfile, NoiseLines, Strategy};
use crate::range::TimestampParser;
use crate::session::{ElementHandle, PageSession, Selector};

/// A record read from the page, not yet filtered or deduplicated.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: Record,
    /// The block's own permalink, followed for listing → detail chaining.
    pub link: Option<String>,
    pub strategy: Strategy,
}

#[derive(Debug, Default)]
struct Fields {
    author: String,
    body: String,
    time_text: Option<String>,
    time_attr: Option<String>,
}

impl Fields {
    fn is_empty(&self) -> bool {
        self.author.is_empty() && self.body.is_empty()
    }
}

pub struct Extractor<'a> {
    profile: &'a BlockProfile,
    noise: NoiseLines,
    platform: Platform,
    kind: RecordKind,
    parser: TimestampParser,
    skipped: HashSet<ElementHandle>,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(
        profile: &'a BlockProfile,
        noise: NoiseLines,
        platform: Platform,
        kind: RecordKind,
        parser: TimestampParser,
    ) -> Self {
        Self {
            profile,
            noise,
            platform,
            kind,
            parser,
            skipped: HashSet::new(),
        }
    }

    /// Distinct blocks on which every strategy failed so far.
    #[must_use]
    pub fn skipped_blocks(&self) -> usize {
        self.skipped.len()
    }

    /// Read every content block currently in the DOM, in document order.
    ///
    /// # Errors
    ///
    /// Only fatal session errors are returned; everything else skips the
    /// affected block or selector.
    pub async fn extract<S: PageSession>(
        &mut self,
        session: &mut S,
        source_url: &str,
    ) -> Result<Vec<Candidate>, HarvestError> {
        let blocks = self.collect_blocks(session).await?;
        let mut candidates = Vec::with_capacity(blocks.len());

        for block in blocks {
            match self.read_block(session, &block, source_url).await? {
                Some(candidate) => candidates.push(candidate),
                None => {
                    if self.skipped.insert(block.clone()) {
                        tracing::debug!(block = block.id(), "no strategy matched block, skipping");
                    }
                }
            }
        }

        Ok(candidates)
    }

    /// Union of all block selectors, first occurrence wins.
    async fn collect_blocks<S: PageSession>(
        &self,
        session: &mut S,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();
        for selector in &self.profile.blocks {
            match session.find_elements(selector).await {
                Ok(found) => {
                    for handle in found {
                        if seen.insert(handle.clone()) {
                            blocks.push(handle);
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(selector = %selector, error = %e, "block lookup failed");
                }
            }
        }
        Ok(blocks)
    }

    async fn read_block<S: PageSession>(
        &self,
        session: &mut S,
        block: &ElementHandle,
        source_url: &str,
    ) -> Result<Option<Candidate>, HarvestError> {
        for &strategy in &self.profile.strategies {
            let attempt = match strategy {
                Strategy::StructuredTime => self.structured_time(session, block).await,
                Strategy::ClassPattern => self.class_pattern(session, block).await,
                Strategy::FreeText => self.free_text(session, block).await,
            };
            let fields = match attempt {
                Ok(Some(fields)) if !fields.is_empty() => fields,
                Ok(_) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(%strategy, block = block.id(), error = %e, "strategy failed");
                    continue;
                }
            };

            let (platform_id, link) = self.block_identity(session, block).await?;
            let timestamp_parsed = self
                .parser
                .parse_timestamp(fields.time_text.as_deref(), fields.time_attr.as_deref());
            let identity = derive_identity(platform_id.as_deref(), &fields.author, &fields.body);

            return Ok(Some(Candidate {
                record: Record {
                    identity,
                    author: fields.author,
                    body: fields.body,
                    timestamp_raw: fields.time_attr.or(fields.time_text),
                    timestamp_parsed,
                    source_url: source_url.to_string(),
                    platform: self.platform,
                    kind: self.kind,
                },
                link,
                strategy,
            }));
        }
        Ok(None)
    }

    async fn structured_time<S: PageSession>(
        &self,
        session: &mut S,
        block: &ElementHandle,
    ) -> Result<Option<Fields>, HarvestError> {
        let fields = &self.profile.fields;
        let Some(time_selector) = &fields.time else {
            return Ok(None);
        };
        let Some(time_el) = session
            .find_elements_within(block, time_selector)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let Some(time_attr) = session
            .element_attribute(&time_el, fields.time_attr)
            .await?
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let time_text = Some(session.element_text(&time_el).await?.trim().to_string())
            .filter(|t| !t.is_empty());

        let author = first_text(session, block, &fields.author).await?;
        let (author, body) = match first_text(session, block, &fields.body).await? {
            Some(body) => (author.unwrap_or_default(), body),
            None => {
                let text = session.element_text(block).await?;
                let parsed = block_text::split_block_text(&text, self.noise, author.as_deref());
                (parsed.author, parsed.body)
            }
        };

        Ok(Some(Fields {
            author,
            body,
            time_text,
            time_attr: Some(time_attr),
        }))
    }

    async fn class_pattern<S: PageSession>(
        &self,
        session: &mut S,
        block: &ElementHandle,
    ) -> Result<Option<Fields>, HarvestError> {
        let fields = &self.profile.fields;
        let author = first_text(session, block, &fields.author).await?;
        let body = first_text(session, block, &fields.body).await?;
        if author.is_none() && body.is_none() {
            return Ok(None);
        }
        let time_text = first_text(session, block, &fields.time_text).await?;
        Ok(Some(Fields {
            author: author.unwrap_or_default(),
            body: body.unwrap_or_default(),
            time_text,
            time_attr: None,
        }))
    }

    async fn free_text<S: PageSession>(
        &self,
        session: &mut S,
        block: &ElementHandle,
    ) -> Result<Option<Fields>, HarvestError> {
        let text = session.element_text(block).await?;
        let parsed = block_text::split_block_text(&text, self.noise, None);
        Ok(Some(Fields {
            author: parsed.author,
            body: parsed.body,
            time_text: parsed.time_text,
            time_attr: None,
        }))
    }

    /// Platform id for identity and the permalink for chaining.
    async fn block_identity<S: PageSession>(
        &self,
        session: &mut S,
        block: &ElementHandle,
    ) -> Result<(Option<String>, Option<String>), HarvestError> {
        let fields = &self.profile.fields;

        let mut link = None;
        if let Some(selector) = &fields.permalink {
            let anchor = lookup(session.find_elements_within(block, selector).await)?
                .and_then(|found| found.into_iter().next());
            if let Some(anchor) = anchor {
                link = lookup(session.element_attribute(&anchor, "href").await)?
                    .flatten()
                    .filter(|href| !href.trim().is_empty());
            }
        }

        if link.is_some() {
            return Ok((link.clone(), link));
        }

        let id = match fields.id_attr {
            Some(name) => lookup(session.element_attribute(block, name).await)?.flatten(),
            None => None,
        };
        Ok((id, None))
    }
}

/// Fatal errors propagate; any other lookup failure reads as "not found".
fn lookup<T>(result: Result<T, HarvestError>) -> Result<Option<T>, HarvestError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "identity lookup failed");
            Ok(None)
        }
    }
}

/// First non-empty trimmed text among `selectors` inside `block`.
pub(crate) async fn first_text<S: PageSession>(
    session: &mut S,
    block: &ElementHandle,
    selectors: &[Selector],
) -> Result<Option<String>, HarvestError> {
    for selector in selectors {
        for handle in session.find_elements_within(block, selector).await? {
            let text = session.element_text(&handle).await?;
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
