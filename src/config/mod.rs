pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;

pub use catalog::Catalog;
#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};

use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::path::Path;

/// 載入內建服務目錄，若有指定檔案則覆寫同名服務，最後驗證
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let mut catalog = Catalog::builtin()?;
    if let Some(path) = path {
        tracing::info!("📄 Loading catalog overrides from {}", path.display());
        catalog = catalog.merge(Catalog::from_file(path)?);
    }
    catalog.validate()?;
    tracing::debug!("✅ Catalog ready with {} services", catalog.services.len());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_catalog_with_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[catalog]
name = "local"

[[services]]
name = "internal"
base_url = "http://localhost:8080"

[[services.operations]]
name = "health"
path = "/health"
"#
        )
        .unwrap();

        let builtin = Catalog::builtin().unwrap();
        let catalog = load_catalog(Some(file.path())).unwrap();
        assert_eq!(catalog.catalog.name, "local");
        assert_eq!(catalog.services.len(), builtin.services.len() + 1);
        assert!(catalog.service("internal").is_ok());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[catalog]
name = "broken"

[[services]]
name = "bad"
base_url = "ftp://example.com"
operations = []
"#
        )
        .unwrap();

        assert!(load_catalog(Some(file.path())).is_err());
    }
}
