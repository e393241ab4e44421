//! Dependency resolution: make every declared package importable before a run.
//!
//! Resolution never fails. Each package ends up in the log as found, installed
//! or failed, and a failed install simply surfaces later as an import error
//! from the sandboxed run.

use std::sync::Arc;

use log::{info, warn};

use super::installer::{InstallScope, PackageInstaller};
use super::spec::{DependencySpec, parse_declarations};
use crate::domain::{DependencyOutcome, DependencyRecord};

/// Ensures the packages declared in generated code are available.
pub struct DependencyResolver<I: PackageInstaller> {
    installer: Arc<I>,
}

impl<I: PackageInstaller> DependencyResolver<I> {
    pub fn new(installer: Arc<I>) -> Self {
        Self { installer }
    }

    /// Resolve all declarations in `code`, in first-seen order.
    pub async fn resolve(&self, code: &str) -> Vec<DependencyRecord> {
        let specs = parse_declarations(code);
        if specs.is_empty() {
            return Vec::new();
        }

        info!("Resolving {} declared dependencies", specs.len());
        let mut log = Vec::with_capacity(specs.len());
        for spec in &specs {
            let outcome = self.resolve_one(spec).await;
            log.push(DependencyRecord::new(spec.package_name.clone(), outcome));
        }
        log
    }

    async fn resolve_one(&self, spec: &DependencySpec) -> DependencyOutcome {
        if self.installer.is_importable(&spec.import_name()).await {
            return DependencyOutcome::FoundPreinstalled;
        }

        if self.installer.install(&spec.requirement, InstallScope::User).await {
            info!("Installed {} (user scope)", spec.requirement);
            return DependencyOutcome::Installed;
        }

        warn!("User-scoped install of {} failed, retrying unscoped", spec.requirement);
        if self.installer.install(&spec.requirement, InstallScope::Environment).await {
            info!("Installed {}", spec.requirement);
            return DependencyOutcome::Installed;
        }

        warn!("Could not install {}", spec.requirement);
        DependencyOutcome::InstallFailed
    }
}
