use crate::fixed::Seconds;
use crate::id::{ItemId, RecipeId};
use crate::recipe::{MAX_INGREDIENTS, Recipe};
use std::collections::{HashMap, HashSet};

/// An item type definition in the catalog. Sprite and other presentation
/// metadata live with the rendering collaborator; only names are kept here.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub display_name: String,
}

/// Builder for constructing an immutable [`Catalog`].
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<Recipe>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    duplicates: Vec<String>,
    /// Items refused because every id was taken.
    overflow: usize,
}

/// Largest number of item types a catalog can hold: ids `1..=u16::MAX`.
pub const MAX_ITEMS: usize = u16::MAX as usize;

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Ids start at 1; 0 is the empty sentinel.
    ///
    /// Past [`MAX_ITEMS`] the item is not registered, [`ItemId::EMPTY`] is
    /// returned and [`build`](Self::build) fails with
    /// [`CatalogError::TooManyItems`].
    pub fn register_item(&mut self, name: &str, display_name: &str) -> ItemId {
        let Ok(raw) = u16::try_from(self.items.len() + 1) else {
            self.overflow += 1;
            return ItemId::EMPTY;
        };
        let id = ItemId(raw);
        self.items.push(ItemDef {
            name: name.to_string(),
            display_name: display_name.to_string(),
        });
        if self.item_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Register a recipe. Returns its ID (definition order).
    pub fn register_recipe(
        &mut self,
        name: &str,
        ingredients: Vec<ItemId>,
        output: ItemId,
        output_quantity: u32,
        work_duration: Seconds,
    ) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(Recipe {
            name: name.to_string(),
            ingredients,
            output,
            output_quantity,
            work_duration,
        });
        if self.recipe_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Lookup item id by name.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Lookup recipe id by name.
    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    fn is_known_item(&self, item: ItemId) -> bool {
        !item.is_empty() && (item.0 as usize) <= self.items.len()
    }

    /// Finalize and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if self.overflow > 0 {
            return Err(CatalogError::TooManyItems {
                count: self.items.len() + self.overflow,
            });
        }
        if let Some(name) = self.duplicates.first() {
            return Err(CatalogError::DuplicateName(name.clone()));
        }

        for recipe in &self.recipes {
            if recipe.ingredients.is_empty() {
                return Err(CatalogError::NoIngredients(recipe.name.clone()));
            }
            if recipe.ingredients.len() > MAX_INGREDIENTS {
                return Err(CatalogError::TooManyIngredients {
                    recipe: recipe.name.clone(),
                    count: recipe.ingredients.len(),
                });
            }
            let mut seen = HashSet::new();
            for &ingredient in &recipe.ingredients {
                if !self.is_known_item(ingredient) {
                    return Err(CatalogError::InvalidItemRef(ingredient));
                }
                if !seen.insert(ingredient) {
                    return Err(CatalogError::DuplicateIngredient {
                        recipe: recipe.name.clone(),
                        item: ingredient,
                    });
                }
            }
            if !self.is_known_item(recipe.output) {
                return Err(CatalogError::InvalidItemRef(recipe.output));
            }
            if recipe.output_quantity == 0 {
                return Err(CatalogError::ZeroOutput(recipe.name.clone()));
            }
            if recipe.work_duration <= Seconds::ZERO {
                return Err(CatalogError::NonPositiveDuration(recipe.name.clone()));
            }
        }

        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
        })
    }
}

/// Immutable catalog of items and recipes. Frozen after build(); shared by
/// reference between the authority and its stations.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<Recipe>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl Catalog {
    pub fn get_item(&self, id: ItemId) -> Option<&ItemDef> {
        if id.is_empty() {
            return None;
        }
        self.items.get(id.0 as usize - 1)
    }

    /// Whether `id` names a registered item (the empty sentinel does not).
    pub fn contains_item(&self, id: ItemId) -> bool {
        self.get_item(id).is_some()
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    /// Display name for an item, falling back to its internal name.
    pub fn display_name(&self, id: ItemId) -> Option<&str> {
        self.get_item(id).map(|def| {
            if def.display_name.is_empty() {
                def.name.as_str()
            } else {
                def.display_name.as_str()
            }
        })
    }

    /// All recipes in definition order.
    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &Recipe)> {
        self.recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (RecipeId(i as u32), r))
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{count} item types registered (max {MAX_ITEMS})")]
    TooManyItems { count: usize },
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemId),
    #[error("recipe '{0}' has no ingredients")]
    NoIngredients(String),
    #[error("recipe '{recipe}' has {count} ingredients (max {MAX_INGREDIENTS})")]
    TooManyIngredients { recipe: String, count: usize },
    #[error("recipe '{recipe}' lists ingredient {item:?} more than once")]
    DuplicateIngredient { recipe: String, item: ItemId },
    #[error("recipe '{0}' produces nothing")]
    ZeroOutput(String),
    #[error("recipe '{0}' has a non-positive work duration")]
    NonPositiveDuration(String),
}
