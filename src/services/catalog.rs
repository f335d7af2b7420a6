use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

use crate::domain::{
    errors::{BrowserError, BrowserResult, PolicyViolation},
    models::{
        extension_of, validate_object_name, BucketDescriptor, FileObject, Permissions,
        RetentionPolicy, Role, SecurityFlags, TypeFamilyDescriptor,
    },
    value_objects::{BucketId, TypeFamilyId},
};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// Static catalog configuration as loaded from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub type_families: Vec<TypeFamilyDescriptor>,
    pub buckets: Vec<BucketDescriptor>,
}

/// Read-only registry of buckets and type families, built once at startup.
///
/// Extension lookup goes through a per-bucket index so overlapping extensions
/// between families resolve the same way every time: the family listed first
/// in the bucket's `allowed_type_families` wins.
#[derive(Debug, Clone)]
pub struct BucketCatalog {
    buckets: Vec<BucketDescriptor>,
    bucket_index: HashMap<BucketId, usize>,
    families: HashMap<TypeFamilyId, TypeFamilyDescriptor>,
    extension_index: HashMap<BucketId, HashMap<String, TypeFamilyId>>,
}

impl BucketCatalog {
    pub fn from_config(config: CatalogConfig) -> BrowserResult<Self> {
        let mut families = HashMap::new();
        for family in config.type_families {
            let id = family.id.clone();
            if families.insert(id.clone(), family).is_some() {
                return Err(BrowserError::InvalidConfiguration {
                    message: format!("duplicate type family '{}'", id),
                });
            }
        }

        let mut bucket_index = HashMap::new();
        let mut extension_index = HashMap::new();
        for (position, bucket) in config.buckets.iter().enumerate() {
            if bucket_index.insert(bucket.id.clone(), position).is_some() {
                return Err(BrowserError::InvalidConfiguration {
                    message: format!("duplicate bucket '{}'", bucket.id),
                });
            }

            let mut extensions: HashMap<String, TypeFamilyId> = HashMap::new();
            for family_id in &bucket.allowed_type_families {
                let family = families.get(family_id).ok_or_else(|| {
                    BrowserError::InvalidConfiguration {
                        message: format!(
                            "bucket '{}' references unknown type family '{}'",
                            bucket.id, family_id
                        ),
                    }
                })?;
                for ext in &family.extensions {
                    extensions
                        .entry(ext.to_ascii_lowercase())
                        .or_insert_with(|| family_id.clone());
                }
            }
            extension_index.insert(bucket.id.clone(), extensions);
        }

        debug!(
            buckets = config.buckets.len(),
            type_families = families.len(),
            "Bucket catalog loaded"
        );

        Ok(Self {
            buckets: config.buckets,
            bucket_index,
            families,
            extension_index,
        })
    }

    pub fn from_json(json: &str) -> BrowserResult<Self> {
        let config: CatalogConfig =
            serde_json::from_str(json).map_err(|e| BrowserError::InvalidConfiguration {
                message: format!("catalog is not valid JSON: {}", e),
            })?;
        Self::from_config(config)
    }

    pub fn load(path: &Path) -> BrowserResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| BrowserError::InvalidConfiguration {
                message: format!("cannot read catalog {}: {}", path.display(), e),
            })?;
        Self::from_json(&json)
    }

    /// The built-in catalog used when no catalog file is configured
    pub fn builtin() -> BrowserResult<Self> {
        Self::from_config(builtin_config())
    }

    /// Buckets in declaration order
    pub fn buckets(&self) -> &[BucketDescriptor] {
        &self.buckets
    }

    /// Look up a bucket. Unknown ids are an error, never a default bucket.
    pub fn resolve(&self, id: &BucketId) -> BrowserResult<&BucketDescriptor> {
        self.bucket_index
            .get(id)
            .map(|&idx| &self.buckets[idx])
            .ok_or_else(|| BrowserError::BucketNotFound { bucket: id.clone() })
    }

    pub fn type_family(&self, id: &TypeFamilyId) -> BrowserResult<&TypeFamilyDescriptor> {
        self.families
            .get(id)
            .ok_or_else(|| BrowserError::TypeFamilyNotFound { family: id.clone() })
    }

    /// Type families accepted by a bucket, in the bucket's declared order
    pub fn type_families_for(&self, id: &BucketId) -> BrowserResult<Vec<&TypeFamilyDescriptor>> {
        self.resolve(id)?
            .allowed_type_families
            .iter()
            .map(|family| self.type_family(family))
            .collect()
    }

    /// Resolve a file name to one of the bucket's families by extension
    pub fn family_for_name(
        &self,
        bucket: &BucketId,
        name: &str,
    ) -> BrowserResult<Option<&TypeFamilyDescriptor>> {
        self.resolve(bucket)?;
        let Some(ext) = extension_of(name) else {
            return Ok(None);
        };
        match self
            .extension_index
            .get(bucket)
            .and_then(|index| index.get(&ext))
        {
            Some(family) => self.type_family(family).map(Some),
            None => Ok(None),
        }
    }

    /// Check an incoming upload's name and size against the bucket policy and return its
    /// type family
    pub fn validate_upload(
        &self,
        bucket: &BucketId,
        name: &str,
        size: u64,
    ) -> BrowserResult<TypeFamilyId> {
        let descriptor = self.resolve(bucket)?;
        validate_object_name(name)?;
        let violation = |violation| BrowserError::PolicyViolation {
            bucket: bucket.clone(),
            name: name.to_string(),
            violation,
        };

        let family = self.family_for_name(bucket, name)?.ok_or_else(|| {
            violation(PolicyViolation::TypeNotAllowed {
                extension: extension_of(name),
            })
        })?;

        if size == 0 {
            return Err(violation(PolicyViolation::EmptyObject));
        }

        let limit = family.max_size.min(descriptor.max_object_size);
        if size > limit {
            return Err(violation(PolicyViolation::SizeExceeded { size, limit }));
        }

        Ok(family.id.clone())
    }

    /// Check that an existing object's family is accepted by the bucket
    pub fn validate_object(&self, bucket: &BucketId, object: &FileObject) -> BrowserResult<()> {
        let descriptor = self.resolve(bucket)?;
        if descriptor.allows_family(&object.type_family) {
            Ok(())
        } else {
            Err(BrowserError::PolicyViolation {
                bucket: bucket.clone(),
                name: object.name.clone(),
                violation: PolicyViolation::TypeNotAllowed {
                    extension: object.extension(),
                },
            })
        }
    }
}

fn family(
    id: &str,
    extensions: &[&str],
    mime_hint: &str,
    previewable: bool,
    max_size: u64,
) -> TypeFamilyDescriptor {
    TypeFamilyDescriptor {
        id: TypeFamilyId::from_trusted(id),
        extensions: extensions.iter().map(|e| e.to_string()).collect(),
        mime_hint: mime_hint.to_string(),
        previewable,
        max_size,
    }
}

fn roles(names: &[&str]) -> BTreeSet<Role> {
    names.iter().map(|n| Role::new(*n)).collect()
}

#[allow(clippy::too_many_arguments)]
fn bucket(
    id: &str,
    display_name: &str,
    description: &str,
    families: &[&str],
    max_object_size: u64,
    retention_days: Option<u32>,
    contains_phi: bool,
    writers: &[&str],
) -> BucketDescriptor {
    BucketDescriptor {
        id: BucketId::from_trusted(id),
        display_name: display_name.to_string(),
        description: description.to_string(),
        allowed_type_families: families
            .iter()
            .map(|f| TypeFamilyId::from_trusted(f))
            .collect(),
        max_object_size,
        retention: RetentionPolicy {
            retention_days,
            legal_hold: false,
        },
        security: SecurityFlags {
            encryption_required: true,
            contains_phi,
            audit_logging: contains_phi,
        },
        permissions: Permissions {
            read: roles(&["viewer", "clinician", "researcher", "admin"]),
            write: roles(writers),
            delete: roles(&["admin"]),
        },
    }
}

/// Default buckets and type families
#[rustfmt::skip]
pub fn builtin_config() -> CatalogConfig {
    CatalogConfig {
        type_families: vec![
            family("dicom", &["dcm", "dicom"], "application/dicom", true, 2 * GB),
            family("image", &["png", "jpg", "jpeg", "tif", "tiff"], "image/*", true, 50 * MB),
            family("genomic", &["vcf", "fastq", "fq", "bam", "sam", "fasta"], "text/plain", false, 10 * GB),
            family("document", &["pdf", "docx", "txt", "md"], "application/pdf", true, 100 * MB),
            family("tabular", &["csv", "tsv", "xlsx", "parquet", "json"], "text/csv", true, 5 * GB),
            family("model", &["onnx", "pt", "h5", "pkl", "safetensors"], "application/octet-stream", false, 20 * GB),
        ],
        buckets: vec![
            bucket("medical-images", "Medical Images", "DICOM studies and derived imagery", &["dicom", "image"], 2 * GB, Some(3650), true, &["clinician", "admin"]),
            bucket("genomic-data", "Genomic Data", "Sequencing reads and variant calls", &["genomic", "tabular"], 10 * GB, Some(3650), true, &["researcher", "admin"]),
            bucket("clinical-documents", "Clinical Documents", "Reports, consent forms and notes", &["document", "image"], 100 * MB, Some(2555), true, &["clinician", "admin"]),
            bucket("research-datasets", "Research Datasets", "De-identified tabular datasets", &["tabular", "document"], 5 * GB, None, false, &["researcher", "admin"]),
            bucket("ml-models", "ML Models", "Trained model weights", &["model", "document"], 20 * GB, None, false, &["researcher", "admin"]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    fn catalog() -> BucketCatalog {
        BucketCatalog::builtin().unwrap()
    }

    fn id(s: &str) -> BucketId {
        BucketId::new(s).unwrap()
    }

    #[test]
    fn test_resolve_known_bucket() {
        let c = catalog();
        let bucket = c.resolve(&id("genomic-data")).unwrap();
        assert_eq!(bucket.display_name, "Genomic Data");
        assert_eq!(c.buckets().len(), 5);
    }

    #[test]
    fn test_unknown_bucket_is_not_found() {
        let err = catalog().resolve(&id("nonexistent-bucket")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, BrowserError::BucketNotFound { .. }));
    }

    #[test]
    fn test_type_families_for_bucket() {
        let c = catalog();
        let families: Vec<_> = c
            .type_families_for(&id("medical-images"))
            .unwrap()
            .into_iter()
            .map(|f| f.id.as_str().to_string())
            .collect();
        assert_eq!(families, vec!["dicom", "image"]);
        assert!(c.type_families_for(&id("missing-bucket")).is_err());
    }

    #[test]
    fn test_validate_upload_policy() {
        let c = catalog();
        let images = id("medical-images");

        assert_eq!(
            c.validate_upload(&images, "CT_CHEST.DCM", 1024).unwrap().as_str(),
            "dicom"
        );

        let wrong_type = c.validate_upload(&images, "notes.docx", 1024).unwrap_err();
        assert_eq!(wrong_type.kind(), ErrorKind::PolicyViolation);

        let too_big = c
            .validate_upload(&images, "photo.png", 51 * MB)
            .unwrap_err();
        assert!(matches!(
            too_big,
            BrowserError::PolicyViolation {
                violation: PolicyViolation::SizeExceeded { limit, .. },
                ..
            } if limit == 50 * MB
        ));

        let empty = c.validate_upload(&images, "scan.dcm", 0).unwrap_err();
        assert!(matches!(
            empty,
            BrowserError::PolicyViolation {
                violation: PolicyViolation::EmptyObject,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_upload_rejects_unsafe_names() {
        let c = catalog();
        let genomic = id("genomic-data");

        for name in ["runs/../x.vcf", "x\n.vcf", "..", "a\\b.vcf", "   "] {
            let err = c.validate_upload(&genomic, name, 10).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{:?}", name);
        }
        assert!(c.validate_upload(&genomic, "sample..v2.vcf", 10).is_ok());
    }

    #[test]
    fn test_overlapping_extension_prefers_first_declared_family() {
        let json = r#"{
            "type_families": [
                {"id": "notes", "extensions": ["txt"], "mime_hint": "text/plain", "max_size": 10},
                {"id": "logs", "extensions": ["txt", "log"], "mime_hint": "text/plain", "max_size": 10}
            ],
            "buckets": [
                {"id": "logs-first", "display_name": "A", "allowed_type_families": ["logs", "notes"], "max_object_size": 100},
                {"id": "notes-first", "display_name": "B", "allowed_type_families": ["notes", "logs"], "max_object_size": 100}
            ]
        }"#;
        let c = BucketCatalog::from_json(json).unwrap();
        let family = |bucket: &str| {
            c.family_for_name(&id(bucket), "a.txt")
                .unwrap()
                .unwrap()
                .id
                .as_str()
                .to_string()
        };
        assert_eq!(family("logs-first"), "logs");
        assert_eq!(family("notes-first"), "notes");
    }

    #[test]
    fn test_invalid_configurations() {
        let unknown_family = r#"{
            "type_families": [],
            "buckets": [{"id": "abc", "display_name": "A", "allowed_type_families": ["ghost"], "max_object_size": 1}]
        }"#;
        assert!(matches!(
            BucketCatalog::from_json(unknown_family),
            Err(BrowserError::InvalidConfiguration { .. })
        ));

        let duplicate_bucket = r#"{
            "type_families": [],
            "buckets": [
                {"id": "abc", "display_name": "A", "allowed_type_families": [], "max_object_size": 1},
                {"id": "abc", "display_name": "B", "allowed_type_families": [], "max_object_size": 1}
            ]
        }"#;
        assert!(BucketCatalog::from_json(duplicate_bucket).is_err());
        assert!(BucketCatalog::from_json("not json").is_err());
    }
}
