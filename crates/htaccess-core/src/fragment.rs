//! Fragment providers and their composition into one managed body.

use std::fmt;

use htaccess_blocks::PatchDirective;
use tracing::debug;

use crate::context::Context;

/// Priority given to fragments that do not ask for one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// An independently enabled unit of rules contributed to the managed block.
pub trait FragmentProvider: Send + Sync {
    /// Stable identifier; registering the same id again replaces the fragment.
    fn id(&self) -> &str;

    /// Lower priorities render first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn is_enabled(&self, ctx: &Context) -> bool;

    /// Self-contained rule text without a trailing newline. May embed its
    /// own nested markers.
    fn render(&self, ctx: &Context) -> String;

    /// Directives to run against the composed file.
    fn patches(&self, _ctx: &Context) -> Vec<PatchDirective> {
        Vec::new()
    }
}

/// A fragment with fixed content, as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFragment {
    id: String,
    priority: i32,
    enabled: bool,
    content: String,
    patches: Vec<PatchDirective>,
}

impl StaticFragment {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: DEFAULT_PRIORITY,
            enabled: true,
            content: content.into(),
            patches: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_patches(mut self, patches: Vec<PatchDirective>) -> Self {
        self.patches = patches;
        self
    }
}

impl FragmentProvider for StaticFragment {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self, _ctx: &Context) -> bool {
        self.enabled
    }

    fn render(&self, _ctx: &Context) -> String {
        self.content.clone()
    }

    fn patches(&self, _ctx: &Context) -> Vec<PatchDirective> {
        self.patches.clone()
    }
}

/// Ordered set of fragment providers.
///
/// Order is `(priority, id)`, so composition is deterministic regardless of
/// registration order.
#[derive(Default)]
pub struct FragmentRegistry {
    fragments: Vec<Box<dyn FragmentProvider>>,
}

impl fmt::Debug for FragmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment, replacing any existing one with the same id.
    pub fn register(&mut self, fragment: Box<dyn FragmentProvider>) {
        let id = fragment.id().to_string();
        self.fragments.retain(|f| f.id() != id);
        self.fragments.push(fragment);
        self.fragments
            .sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.id().cmp(b.id())));
        debug!(id = %id, "registered fragment");
    }

    /// Remove a fragment. Returns whether it was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.fragments.len();
        self.fragments.retain(|f| f.id() != id);
        before != self.fragments.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.iter().any(|f| f.id() == id)
    }

    /// Registered ids in composition order.
    pub fn ids(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Render every enabled fragment, trimmed, joined by one blank line.
    /// Fragments that render to nothing are dropped.
    pub fn compose(&self, ctx: &Context) -> String {
        self.fragments
            .iter()
            .filter(|f| f.is_enabled(ctx))
            .map(|f| f.render(ctx).trim().to_string())
            .filter(|rendered| !rendered.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Patch directives of enabled fragments, in composition order.
    pub fn patches(&self, ctx: &Context) -> Vec<PatchDirective> {
        self.fragments
            .iter()
            .filter(|f| f.is_enabled(ctx))
            .flat_map(|f| f.patches(ctx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htaccess_blocks::PatchScope;
    use pretty_assertions::assert_eq;

    fn ctx() -> Context {
        Context::new("/tmp/.htaccess")
    }

    #[test]
    fn test_compose_orders_by_priority_then_id() {
        let mut registry = FragmentRegistry::new();
        registry.register(Box::new(StaticFragment::new("b", "RuleB").with_priority(200)));
        registry.register(Box::new(StaticFragment::new("z", "RuleZ")));
        registry.register(Box::new(StaticFragment::new("a", "RuleA")));

        assert_eq!(registry.ids(), vec!["a", "z", "b"]);
        assert_eq!(registry.compose(&ctx()), "RuleA\n\nRuleZ\n\nRuleB");
    }

    #[test]
    fn test_disabled_and_blank_fragments_are_dropped() {
        let mut registry = FragmentRegistry::new();
        registry.register(Box::new(StaticFragment::new("a", "\n  RuleA  \n")));
        registry.register(Box::new(StaticFragment::new("blank", "   \n")));
        registry.register(Box::new(StaticFragment::new("off", "RuleOff").with_enabled(false)));

        assert_eq!(registry.compose(&ctx()), "RuleA");
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = FragmentRegistry::new();
        registry.register(Box::new(StaticFragment::new("a", "Old")));
        registry.register(Box::new(StaticFragment::new("a", "New")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.compose(&ctx()), "New");

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_patches_follow_composition_order() {
        let first = PatchDirective::new(PatchScope::Full, "a", "b");
        let second = PatchDirective::new(PatchScope::WpBlock, "c", "d");
        let mut registry = FragmentRegistry::new();
        registry.register(Box::new(
            StaticFragment::new("late", "x").with_priority(300).with_patches(vec![second.clone()]),
        ));
        registry.register(Box::new(StaticFragment::new("early", "y").with_patches(vec![first.clone()])));
        registry.register(Box::new(
            StaticFragment::new("off", "z")
                .with_enabled(false)
                .with_patches(vec![PatchDirective::new(PatchScope::Full, "q", "r")]),
        ));

        assert_eq!(registry.patches(&ctx()), vec![first, second]);
    }
}
