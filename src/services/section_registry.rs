use crate::domain::{
    errors::{BrowserError, BrowserResult},
    models::ExportSectionDescriptor,
};

/// Named field subsets an export can be scoped to
#[derive(Debug, Clone)]
pub struct SectionRegistry {
    sections: Vec<ExportSectionDescriptor>,
}

impl SectionRegistry {
    pub fn new(sections: Vec<ExportSectionDescriptor>) -> Self {
        Self { sections }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            ExportSectionDescriptor::new(
                "full_report",
                "Full Report",
                &[
                    "gene",
                    "variant",
                    "rsid",
                    "genotype",
                    "classification",
                    "clinical_significance",
                    "condition",
                ],
            ),
            ExportSectionDescriptor::new(
                "variants_only",
                "Variants Only",
                &["gene", "variant", "rsid", "genotype", "classification"],
            ),
            ExportSectionDescriptor::new(
                "risk_summary",
                "Risk Summary",
                &["condition", "risk_level", "score"],
            ),
        ])
    }

    pub fn get(&self, key: &str) -> BrowserResult<&ExportSectionDescriptor> {
        self.sections
            .iter()
            .find(|section| section.key == key)
            .ok_or_else(|| BrowserError::UnknownSection {
                key: key.to_string(),
            })
    }

    pub fn sections(&self) -> &[ExportSectionDescriptor] {
        &self.sections
    }
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
