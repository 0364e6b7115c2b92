//! Rewrite dispatcher
//!
//! Matches an address against the target table and replaces it with the
//! payload of the first applicable target, then walks the whole table again
//! against the new value. The chain stops at the first address no target
//! unwraps (the fixed point) or after [`MAX_REWRITE_DEPTH`] layers.

use log::debug;

use crate::decode::{decode_uri_component, DecodeError};
use crate::dom::DocumentTree;
use crate::extract::{slice_payload, Slice};
use crate::table::TargetTable;
use crate::ADDRESS_ATTRIBUTE;

/// Upper bound on wrapper layers peeled from one address.
pub const MAX_REWRITE_DEPTH: usize = 32;

/// Error type for a single element's rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("Target {target}: payload is not valid percent-encoding: {source}")]
    Decode {
        target: usize,
        #[source]
        source: DecodeError,
    },
    #[error("Address still wrapped after {0} layers")]
    TooDeep(usize),
}

/// Result of unwrapping a bare address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    pub url: String,
    /// Number of wrapper layers removed; 0 means the input was left alone
    pub layers: usize,
}

/// Result of rewriting an element in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rewrite {
    pub layers: usize,
}

impl Rewrite {
    #[inline]
    pub fn is_rewritten(&self) -> bool {
        self.layers > 0
    }
}

/// Target table bound to the host of the current page.
#[derive(Debug, Clone)]
pub struct Rewriter<'t> {
    table: &'t TargetTable,
    host: String,
}

impl<'t> Rewriter<'t> {
    pub fn new(table: &'t TargetTable, host: &str) -> Self {
        Self {
            table,
            host: host.to_ascii_lowercase(),
        }
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn table(&self) -> &'t TargetTable {
        self.table
    }

    /// Remove one wrapper layer.
    ///
    /// Returns the index of the target that fired and the new address, or
    /// `None` when no target applies. Targets whose delimiters cannot be
    /// located are skipped.
    pub fn unwrap_once(&self, href: &str) -> Result<Option<(usize, String)>, RewriteError> {
        for (index, target) in self.table.iter().enumerate() {
            if !target.scope().applies_to(&self.host) || !target.is_wrapped(href) {
                continue;
            }

            let payload = match slice_payload(href, target) {
                Slice::Payload(payload) => payload,
                Slice::NoStartMarker => {
                    debug!("target {}: no start marker in {}", index, href);
                    continue;
                }
                Slice::IndexOutOfRange => {
                    debug!("target {}: occurrence index out of range in {}", index, href);
                    continue;
                }
            };

            let next = if target.requires_decoding() {
                decode_uri_component(payload)
                    .map_err(|source| RewriteError::Decode { target: index, source })?
            } else {
                payload.to_string()
            };

            return Ok(Some((index, next)));
        }

        Ok(None)
    }

    /// Unwrap a bare address to its fixed point.
    pub fn clean(&self, href: &str) -> Result<Cleaned, RewriteError> {
        let (layers, outcome) = self.resolve(href);
        outcome?;
        Ok(Cleaned {
            layers: layers.len(),
            url: layers.last().map_or_else(|| href.to_string(), Clone::clone),
        })
    }

    /// Rewrite the element's address in place, one write per layer.
    ///
    /// Layers unwrapped before a decode failure are still written. A chain
    /// that exceeds [`MAX_REWRITE_DEPTH`] writes nothing.
    pub fn rewrite_if_matched<D: DocumentTree>(
        &self,
        doc: &mut D,
        node: &D::Node,
    ) -> Result<Rewrite, RewriteError> {
        let href = match doc.attribute(node, ADDRESS_ATTRIBUTE) {
            Some(href) => href,
            None => return Ok(Rewrite::default()),
        };

        let (layers, outcome) = self.resolve(&href);
        if let Err(RewriteError::TooDeep(depth)) = outcome {
            return Err(RewriteError::TooDeep(depth));
        }

        for layer in &layers {
            doc.set_attribute(node, ADDRESS_ATTRIBUTE, layer);
        }
        outcome.map(|()| Rewrite {
            layers: layers.len(),
        })
    }

    /// Successive addresses from `href` down to the fixed point, excluding `href`.
    pub fn layers(&self, href: &str) -> Result<Vec<String>, RewriteError> {
        let (layers, outcome) = self.resolve(href);
        outcome.map(|()| layers)
    }

    /// Layers unwrapped so far, and how the chain ended.
    fn resolve(&self, href: &str) -> (Vec<String>, Result<(), RewriteError>) {
        let mut layers: Vec<String> = Vec::new();

        loop {
            let current = layers.last().map_or(href, String::as_str);
            let (index, next) = match self.unwrap_once(current) {
                Ok(Some(step)) => step,
                Ok(None) => return (layers, Ok(())),
                Err(e) => return (layers, Err(e)),
            };
            if layers.len() == MAX_REWRITE_DEPTH {
                return (layers, Err(RewriteError::TooDeep(MAX_REWRITE_DEPTH)));
            }
            debug!("target {} unwrapped {} -> {}", index, current, next);
            layers.push(next);
        }
    }
}
