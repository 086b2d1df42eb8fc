//! Name/ordinal substitution tables and the resolver seam.
//!
//! A taxonomy is an immutable, bidirectional map between field names and
//! compact 16-bit ordinals.  When one is active at encode time, fields whose
//! names the taxonomy knows are written with just the ordinal, shrinking the
//! per-field overhead on the wire.  Decoding never substitutes: wire ordinals
//! and names are taken verbatim, and the taxonomy is only consulted again by
//! name-lookup APIs over the decoded message.

use crate::WireErr;
use std::{
  collections::HashMap,
  sync::Arc,
};

/// An immutable bidirectional map between field names and ordinals.
///
/// Construction fails if any name is bound to more than one ordinal; the
/// reverse direction is a map keyed by ordinal, so duplicate ordinals are
/// impossible by construction.
///
/// ```
/// use tessera::Taxonomy;
///
/// let tax = Taxonomy::new([(7, "foo"), (8, "bar")]).unwrap();
/// assert_eq!(tax.ordinal_for("foo"), Some(7));
/// assert_eq!(tax.name_for(8), Some("bar"));
/// assert_eq!(tax.name_for(9), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Taxonomy {
  by_ordinal: HashMap<i16, String>,
  by_name:    HashMap<String, i16>,
}

impl Taxonomy {
  /// Builds a taxonomy from `(ordinal, name)` pairs.
  ///
  /// Returns [`WireErr::TaxonomyNameCollision`] if a name appears under two
  /// ordinals.  A pair repeating an earlier ordinal replaces it.
  pub fn new<I, S>(entries: I) -> Result<Taxonomy, WireErr>
  where
    I: IntoIterator<Item = (i16, S)>,
    S: Into<String>,
  {
    let mut by_ordinal = HashMap::new();
    let mut by_name = HashMap::new();
    for (ordinal, name) in entries {
      let name = name.into();
      if let Some(previous) = by_ordinal.insert(ordinal, name.clone()) {
        by_name.remove(&previous);
      }
      if by_name.insert(name, ordinal).is_some() {
        return Err(err!(debug, WireErr::TaxonomyNameCollision(ordinal)));
      }
    }
    Ok(Taxonomy {
      by_ordinal,
      by_name,
    })
  }

  /// The name bound to `ordinal`, if any.
  #[inline(always)]
  pub fn name_for(&self, ordinal: i16) -> Option<&str> {
    self.by_ordinal.get(&ordinal).map(String::as_str)
  }

  /// The ordinal bound to `name`, if any.
  #[inline(always)]
  pub fn ordinal_for(&self, name: &str) -> Option<i16> {
    self.by_name.get(name).copied()
  }

  /// The number of bindings.
  pub fn len(&self) -> usize {
    self.by_ordinal.len()
  }

  /// Returns `true` if the taxonomy holds no bindings.
  pub fn is_empty(&self) -> bool {
    self.by_ordinal.is_empty()
  }
}

/// Maps taxonomy ids to taxonomies.
///
/// The codec only requires idempotence: resolving the same id twice must
/// yield equivalent taxonomies.  Implementations may be a static map (see
/// [`MapResolver`]), a property-file loader, or a caching remote fetch;
/// transport is outside this crate.
pub trait TaxonomyResolver {
  /// The taxonomy published under `id`, if any.
  fn resolve(&self, id: i16) -> Option<Arc<Taxonomy>>;
}

/// A [`TaxonomyResolver`] over a fixed in-memory table.
#[derive(Clone, Debug, Default)]
pub struct MapResolver {
  taxonomies: HashMap<i16, Arc<Taxonomy>>,
}

impl MapResolver {
  /// Builds a resolver holding the given taxonomies.
  pub fn new<I>(entries: I) -> MapResolver
  where
    I: IntoIterator<Item = (i16, Arc<Taxonomy>)>,
  {
    MapResolver {
      taxonomies: entries.into_iter().collect(),
    }
  }
}

impl TaxonomyResolver for MapResolver {
  fn resolve(&self, id: i16) -> Option<Arc<Taxonomy>> {
    self.taxonomies.get(&id).cloned()
  }
}

/// Applies the encode-time substitution rule to a field's declared name and
/// ordinal, returning `(emit_name, emit_ordinal)`.
///
/// - A field with a name the taxonomy maps, and no ordinal, is written with
///   the mapped ordinal only.
/// - A field whose explicit ordinal agrees with the mapping drops the name.
/// - An explicit ordinal that *conflicts* with the mapping wins: both the
///   ordinal and the name are written as given.  The taxonomy never
///   overrides caller intent.
///
/// Sizing and writing both go through this one function; they must agree on
/// the emitted layout byte for byte.
pub(crate) fn substitute(
  name: Option<&str>,
  ordinal: Option<i16>,
  taxonomy: Option<&Taxonomy>,
) -> (bool, Option<i16>) {
  let mapped =
    name.and_then(|n| taxonomy.and_then(|tax| tax.ordinal_for(n)));
  match (ordinal, mapped) {
    (None, Some(mapped)) => (false, Some(mapped)),
    (Some(ordinal), Some(mapped)) if ordinal == mapped => {
      (false, Some(ordinal))
    },
    (ordinal, _) => (name.is_some(), ordinal),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tax() -> Taxonomy {
    Taxonomy::new([(7, "foo"), (8, "bar")]).unwrap()
  }

  #[test]
  fn duplicate_name_rejected() {
    let result = Taxonomy::new([(1, "foo"), (2, "foo")]);
    assert_eq!(result, Err(WireErr::TaxonomyNameCollision(2)));
  }

  #[test]
  fn rebound_ordinal_replaces() {
    // The same ordinal appearing twice is a replacement, not a collision,
    // and the displaced name must not linger in the reverse map.
    let tax = Taxonomy::new([(1, "old"), (1, "new")]).unwrap();
    assert_eq!(tax.name_for(1), Some("new"));
    assert_eq!(tax.ordinal_for("old"), None);
    assert_eq!(tax.ordinal_for("new"), Some(1));
  }

  #[test]
  fn substitution_compresses_known_name() {
    let tax = tax();
    assert_eq!(substitute(Some("foo"), None, Some(&tax)), (false, Some(7)));
  }

  #[test]
  fn substitution_drops_redundant_name() {
    let tax = tax();
    assert_eq!(
      substitute(Some("foo"), Some(7), Some(&tax)),
      (false, Some(7))
    );
  }

  #[test]
  fn explicit_ordinal_wins_conflict() {
    let tax = tax();
    assert_eq!(
      substitute(Some("foo"), Some(99), Some(&tax)),
      (true, Some(99))
    );
  }

  #[test]
  fn unmapped_name_passes_through() {
    let tax = tax();
    assert_eq!(substitute(Some("baz"), None, Some(&tax)), (true, None));
    assert_eq!(substitute(Some("baz"), Some(3), Some(&tax)), (true, Some(3)));
    assert_eq!(substitute(None, Some(3), Some(&tax)), (false, Some(3)));
    assert_eq!(substitute(Some("foo"), None, None), (true, None));
  }

  #[test]
  fn map_resolver() {
    let resolver = MapResolver::new([(1, Arc::new(tax()))]);
    assert!(resolver.resolve(1).is_some());
    assert!(resolver.resolve(2).is_none());
  }
}
