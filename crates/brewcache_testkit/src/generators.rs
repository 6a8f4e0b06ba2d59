//! Property-based test generators using proptest.
//!
//! Provides strategies for generating recipes and sequences of local
//! mutations.

use crate::fixtures::Recipe;
use proptest::prelude::*;

/// Strategy for generating recipe names.
pub fn recipe_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,12}( [A-Z][a-z]{2,8})?").expect("Invalid regex")
}

/// Strategy for generating beer styles.
pub fn style_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["IPA", "Stout", "Porter", "Saison", "Pilsner", "Dubbel"])
        .prop_map(String::from)
}

/// Strategy for generating unsaved recipes owned by `owner_id`.
pub fn recipe_strategy(owner_id: &'static str) -> impl Strategy<Value = Recipe> {
    (recipe_name_strategy(), style_strategy())
        .prop_map(move |(name, style)| Recipe::named(owner_id, &name).with_style(&style))
}

/// A local mutation against the n-th live record (modulo the live count).
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Create a recipe.
    Create(Recipe),
    /// Rename the record at this index.
    Rename(usize, String),
    /// Delete the record at this index.
    Delete(usize),
}

/// Strategy for generating mutation sequences, weighted towards creates.
pub fn mutation_sequence_strategy(
    owner_id: &'static str,
    max_len: usize,
) -> impl Strategy<Value = Vec<Mutation>> {
    let mutation = prop_oneof![
        3 => recipe_strategy(owner_id).prop_map(Mutation::Create),
        2 => (any::<usize>(), recipe_name_strategy()).prop_map(|(i, n)| Mutation::Rename(i, n)),
        1 => any::<usize>().prop_map(Mutation::Delete),
    ];
    prop::collection::vec(mutation, 1..max_len.max(2))
}
