//! Recipe definitions and the greedy slot-matching algorithm.
//!
//! Matching is pure: given the ids currently in a station's input slots and a
//! set of recipes, it decides which recipe (if any) may start. Ingredients are
//! matched in definition order; each slot satisfies at most one ingredient and
//! the first free matching slot wins, with no backtracking. Unrelated items in
//! other slots never block a match.

use crate::fixed::Seconds;
use crate::id::{ItemId, RecipeId};

/// Maximum number of ingredients in a recipe (one per station input slot).
pub const MAX_INGREDIENTS: usize = crate::slots::STATION_SLOT_COUNT;

/// A crafting recipe. Each ingredient is needed exactly once.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<ItemId>,
    pub output: ItemId,
    pub output_quantity: u32,
    /// Seconds of `Working` needed to complete one run.
    pub work_duration: Seconds,
}

impl Recipe {
    /// Number of ingredients satisfied by distinct slots.
    pub fn match_score(&self, slots: &[ItemId]) -> usize {
        let mut used = vec![false; slots.len()];
        let mut score = 0;
        for &ingredient in &self.ingredients {
            let found = slots
                .iter()
                .enumerate()
                .find(|&(i, &id)| !used[i] && !id.is_empty() && id == ingredient);
            if let Some((i, _)) = found {
                used[i] = true;
                score += 1;
            }
        }
        score
    }

    /// Whether every ingredient finds its own slot.
    pub fn can_craft_with(&self, slots: &[ItemId]) -> bool {
        !self.ingredients.is_empty() && self.match_score(slots) == self.ingredients.len()
    }
}

/// Pick the recipe a station should start from its current slot contents.
///
/// Only fully satisfied recipes are candidates. The highest score (most
/// ingredients consumed) wins; equal scores go to the lowest [`RecipeId`],
/// i.e. the first-defined recipe.
pub fn best_match<'a, I>(slots: &[ItemId], recipes: I) -> Option<(RecipeId, &'a Recipe)>
where
    I: IntoIterator<Item = (RecipeId, &'a Recipe)>,
{
    let mut best: Option<(RecipeId, &'a Recipe, usize)> = None;
    for (id, recipe) in recipes {
        if !recipe.can_craft_with(slots) {
            continue;
        }
        let score = recipe.ingredients.len();
        let better = match best {
            None => true,
            Some((best_id, _, best_score)) => {
                score > best_score || (score == best_score && id < best_id)
            }
        };
        if better {
            best = Some((id, recipe, score));
        }
    }
    best.map(|(id, recipe, _)| (id, recipe))
}
