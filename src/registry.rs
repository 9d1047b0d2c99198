use std::collections::{btree_map, BTreeMap, BTreeSet};

/// Compiler-generated clone suffixes. `foo.constprop.12`, `foo.part.3` and
/// `foo` are all variants of the same source function and must collapse
/// into one registry entry.
const CLONE_SUFFIXES: &[&str] = &[".part", ".isra", ".constprop", ".cold", ".lto_priv"];

/// Strip clone suffixes and `/<node-id>` call-graph disambiguators from a
/// raw identifier.
///
/// Every name is canonicalized before it touches the registry -- fact
/// names, callers and callees alike -- otherwise call edges silently fail
/// to connect to existing facts.
pub fn canonical_name(raw: &str) -> String {
    let mut name = raw;

    if let Some(pos) = name.find('/') {
        name = &name[..pos];
    }

    for suffix in CLONE_SUFFIXES {
        if let Some(pos) = name.find(suffix) {
            name = &name[..pos];
        }
    }

    name.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// Per-function static facts: the frame size the compiler declared (or a
/// conservative estimate), and the call edges discovered so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionFact {
    pub name: String,
    pub own_stack_bytes: u32,
    /// The declared qualifier was `dynamic` or `bounded` (variable-length
    /// arrays, `alloca`). Informational; the declared number is already an
    /// upper bound.
    pub is_dynamic: bool,
    /// The frame size came from the estimate table or the unknown-function
    /// default instead of a compiler fact.
    pub is_estimated: bool,
    pub location: Option<SourceLocation>,
    pub callees: BTreeSet<String>,
}

/// Keyed store of [`FunctionFact`]s, one per canonical function name.
///
/// Built once per run from all discovered artifacts; afterwards only the
/// resolver touches it, through [`Registry::record_estimate`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    facts: BTreeMap<String, FunctionFact>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a compiler-declared stack-usage fact.
    ///
    /// Repeated facts for the same name (repeated compilation of a unit)
    /// keep the *maximum* frame size and OR the dynamic flag. The stored
    /// value never shrinks.
    pub fn record_fact(&mut self, raw_name: &str, bytes: u32, is_dynamic: bool, location: SourceLocation) {
        let name = canonical_name(raw_name);

        match self.facts.entry(name.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(FunctionFact {
                    name,
                    own_stack_bytes: bytes,
                    is_dynamic,
                    is_estimated: false,
                    location: Some(location),
                    callees: BTreeSet::new(),
                });
            }
            btree_map::Entry::Occupied(mut slot) => {
                let fact = slot.get_mut();
                if fact.is_estimated {
                    // a compiler fact supersedes a synthesized estimate
                    fact.own_stack_bytes = bytes;
                    fact.is_estimated = false;
                    fact.is_dynamic = is_dynamic;
                    fact.location = Some(location);
                } else {
                    fact.own_stack_bytes = fact.own_stack_bytes.max(bytes);
                    fact.is_dynamic |= is_dynamic;
                }
            }
        }
    }

    /// Add a call edge. Edges from callers without a fact are dropped:
    /// the caller was never compiled locally (weak/ifunc resolution noise)
    /// and there is nothing to attach the edge to.
    pub fn record_call(&mut self, raw_caller: &str, raw_callee: &str) {
        let caller = canonical_name(raw_caller);
        let callee = canonical_name(raw_callee);

        match self.facts.get_mut(&caller) {
            Some(fact) => {
                fact.callees.insert(callee);
            }
            None => log::trace!("dropping call edge from unknown caller `{caller}`"),
        }
    }

    /// Lazily insert a synthesized estimate for a function with no
    /// compiler fact. Idempotent: an existing entry is never overwritten,
    /// so declared facts always win.
    pub fn record_estimate(&mut self, raw_name: &str, bytes: u32) {
        let name = canonical_name(raw_name);

        self.facts.entry(name.clone()).or_insert_with(|| FunctionFact {
            name,
            own_stack_bytes: bytes,
            is_dynamic: false,
            is_estimated: true,
            location: None,
            callees: BTreeSet::new(),
        });
    }

    pub fn fact(&self, name: &str) -> Option<&FunctionFact> {
        self.facts.get(name)
    }

    /// The compiler-declared frame size, if any. Estimated entries are
    /// not declarations.
    pub fn declared_stack(&self, name: &str) -> Option<u32> {
        self.facts
            .get(name)
            .filter(|fact| !fact.is_estimated)
            .map(|fact| fact.own_stack_bytes)
    }

    pub fn is_estimated(&self, name: &str) -> bool {
        self.facts.get(name).map_or(false, |fact| fact.is_estimated)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionFact> {
        self.facts.values()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation {
            file: "main.c".into(),
            line,
        }
    }

    #[rstest]
    #[case::plain("foo", "foo")]
    #[case::partial_inline("foo.part.3", "foo")]
    #[case::const_propagation("foo.constprop.12", "foo")]
    #[case::isra("foo.isra.0", "foo")]
    #[case::cold_split("foo.cold", "foo")]
    #[case::lto("foo.lto_priv.1", "foo")]
    #[case::node_id("foo/42", "foo")]
    #[case::node_id_and_suffix("foo.isra.0/42", "foo")]
    fn canonicalizes_raw_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(canonical_name(raw), expected);
    }

    #[test]
    fn clone_variants_collapse_into_one_fact() {
        let mut registry = Registry::new();
        registry.record_fact("foo.part.3", 16, false, loc(1));
        registry.record_fact("foo.constprop.12", 24, false, loc(2));
        registry.record_fact("foo", 8, false, loc(3));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.declared_stack("foo"), Some(24));
    }

    #[test]
    fn repeated_facts_merge_to_maximum() {
        let mut registry = Registry::new();
        registry.record_fact("f", 64, false, loc(1));
        registry.record_fact("f", 32, true, loc(1));

        let fact = registry.fact("f").unwrap();
        assert_eq!(fact.own_stack_bytes, 64);
        assert!(fact.is_dynamic, "dynamic flag must be ORed, not overwritten");
    }

    #[test]
    fn edges_from_unknown_callers_are_dropped() {
        let mut registry = Registry::new();
        registry.record_call("never_compiled", "callee");
        assert!(registry.is_empty());
    }

    #[test]
    fn callee_sets_only_grow() {
        let mut registry = Registry::new();
        registry.record_fact("caller", 8, false, loc(1));
        registry.record_call("caller", "a");
        registry.record_call("caller/7", "b.isra.1");
        registry.record_call("caller", "a");

        let callees = &registry.fact("caller").unwrap().callees;
        assert_eq!(callees.iter().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn compiler_fact_supersedes_estimate() {
        let mut registry = Registry::new();
        registry.record_estimate("f", 128);
        assert!(registry.is_estimated("f"));
        assert_eq!(registry.declared_stack("f"), None);

        registry.record_fact("f", 48, false, loc(9));
        assert!(!registry.is_estimated("f"));
        assert_eq!(registry.declared_stack("f"), Some(48));
    }

    #[test]
    fn estimates_never_overwrite_declared_facts() {
        let mut registry = Registry::new();
        registry.record_fact("f", 48, false, loc(9));
        registry.record_estimate("f", 128);

        assert_eq!(registry.declared_stack("f"), Some(48));
        assert!(!registry.is_estimated("f"));
    }
}
