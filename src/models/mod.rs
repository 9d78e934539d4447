pub mod package;

pub use package::PackageRecord;
