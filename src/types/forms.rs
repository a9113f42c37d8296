use serde::Deserialize;

/// Fields of the new-paste form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePaste {
    pub content: String,
    pub password: String,
    pub custom_slug: String,
}

/// Fields of the edit form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditPaste {
    pub content: String,
    pub password: String,
}
