//! Deterministic alias generation
//!
//! Every plan build owns one `NameGenerator` seeded at zero, so identical
//! input always yields identical aliases. Parameter names come from
//! `ParamTable`.

/// Alias bound to the queried entity in every rendered plan
pub const ROOT_ALIAS: &str = "e";

/// Alias of the owner join used by the `user` shortcut
pub const OWNER_AGENT_ALIAS: &str = "__user_agent__";

#[derive(Debug, Default)]
pub struct NameGenerator {
    aliases: usize,
    sub_selects: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next join alias index, shared by metadata and taxonomy joins
    pub fn alias_index(&mut self) -> usize {
        let n = self.aliases;
        self.aliases += 1;
        n
    }

    /// Next sub-select index, used for the `#sq:<n>` placeholder and `sq<n>` alias
    pub fn sub_select_index(&mut self) -> usize {
        let n = self.sub_selects;
        self.sub_selects += 1;
        n
    }

    /// Fresh root alias for a correlated sub-query, never equal to `ROOT_ALIAS`
    pub fn subquery_root(&mut self) -> String {
        format!("{}_{}", ROOT_ALIAS, self.alias_index())
    }
}
