//! Dependency provisioning for generated code
//!
//! - spec: parse `# requires:` style declarations into DependencySpec values
//! - installer: PackageInstaller trait and the pip-backed implementation
//! - resolver: DependencyResolver, which probes and installs each declaration

pub mod installer;
pub mod resolver;
pub mod spec;

pub use installer::{InstallScope, PackageInstaller, PipInstaller};
pub use resolver::DependencyResolver;
pub use spec::{DependencySpec, parse_declarations};
