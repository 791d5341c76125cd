use serde::{Deserialize, Serialize};

/// Kind of a scene object as reported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Mesh,
    Camera,
    Light,
    Empty,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub category_id: Option<u32>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            category_id: None,
        }
    }
}

/// Give `category_id` to every object whose name starts with `prefix`.
/// Returns the names of the objects that were tagged.
pub fn assign_categories(objects: &mut [SceneObject], prefix: &str, category_id: u32) -> Vec<String> {
    objects
        .iter_mut()
        .filter(|obj| obj.name.starts_with(prefix))
        .map(|obj| {
            obj.category_id = Some(category_id);
            obj.name.clone()
        })
        .collect()
}
