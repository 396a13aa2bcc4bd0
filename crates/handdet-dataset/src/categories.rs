use std::collections::HashMap;

use crate::coco::CocoCategory;

/// Mapping from COCO category ids to contiguous YOLO class ids.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    ids: HashMap<u64, u32>,
    names: Vec<String>,
}

impl CategoryMap {
    /// Build the mapping.
    ///
    /// Without targets every category is kept, numbered in file order. With
    /// targets, target `i` becomes class `i` and binds to the first category
    /// whose name matches it case-insensitively.
    pub fn build(categories: &[CocoCategory], targets: Option<&[String]>) -> Self {
        let mut map = Self::default();

        match targets {
            None => {
                for (i, cat) in categories.iter().enumerate() {
                    map.ids.insert(cat.id, i as u32);
                    map.names.push(cat.name.clone());
                }
            }
            Some(targets) => {
                for (i, target) in targets.iter().enumerate() {
                    map.names.push(target.clone());
                    let wanted = target.to_lowercase();
                    match categories
                        .iter()
                        .find(|cat| cat.name.to_lowercase() == wanted)
                    {
                        Some(cat) => {
                            map.ids.insert(cat.id, i as u32);
                        }
                        None => {
                            let available: Vec<&str> =
                                categories.iter().map(|c| c.name.as_str()).collect();
                            tracing::warn!(
                                target_class = %target,
                                ?available,
                                "target class not found in COCO categories"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(mapping = ?map.ids, names = ?map.names, "category mapping");
        map
    }

    pub fn yolo_id(&self, coco_category_id: u64) -> Option<u32> {
        self.ids.get(&coco_category_id).copied()
    }

    /// YOLO class names, indexed by class id.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of COCO categories that map to a class.
    pub fn mapped_len(&self) -> usize {
        self.ids.len()
    }
}
