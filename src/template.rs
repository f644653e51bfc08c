// Template table: maps a numeric template id to the report template it
// selects and the SFTP destination path the generated files land in.
// The table is closed; ids that are not in it are rejected before any
// network call is made.

use crate::error::SubmitError;

/// One known report template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    /// Numeric id the report service keys templates by.
    pub id: u32,
    /// Human-readable name shown in prompts and logs.
    pub label: String,
    /// Remote SFTP directory the regenerated files are delivered to.
    pub destination: String,
}

/// The closed set of templates this tool may submit.
#[derive(Debug, Clone)]
pub struct TemplateTable {
    specs: Vec<TemplateSpec>,
}

impl TemplateTable {
    pub fn new(specs: Vec<TemplateSpec>) -> Self {
        TemplateTable { specs }
    }

    /// Look up a template by id. Unknown ids yield `InvalidTemplate`.
    pub fn resolve(&self, id: u32) -> Result<&TemplateSpec, SubmitError> {
        self.specs
            .iter()
            .find(|spec| spec.id == id)
            .ok_or(SubmitError::InvalidTemplate(id))
    }

    /// Ids of every configured template, in table order.
    pub fn ids(&self) -> Vec<u32> {
        self.specs.iter().map(|spec| spec.id).collect()
    }

    pub fn specs(&self) -> &[TemplateSpec] {
        &self.specs
    }
}
