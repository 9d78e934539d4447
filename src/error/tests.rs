use crate::error::format::format_error_with_color;
use crate::error::*;

#[test]
fn test_error_context_resolution() {
    let error = SyncError::Resolution {
        provider: "apt".to_string(),
        os: "ubuntu".to_string(),
        version: "26.04".to_string(),
    };
    let context = ErrorContext::new(&error);

    let suggestion = context.suggestion.unwrap();
    assert!(suggestion.contains("version_mapping"));
    assert!(suggestion.contains("26.04"));
    assert!(context.details.is_none());
}

#[test]
fn test_error_context_package_not_found_lists_repositories() {
    let error = SyncError::PackageNotFound {
        package: "terraform".to_string(),
        searched: vec![
            "hashicorp-apt-ubuntu-jammy".to_string(),
            "apt-ubuntu-jammy".to_string(),
        ],
    };
    let context = ErrorContext::new(&error);

    let details = context.details.unwrap();
    assert!(details.contains("  - hashicorp-apt-ubuntu-jammy"));
    assert!(details.contains("  - apt-ubuntu-jammy"));
}

#[test]
fn test_error_context_validation_lists_errors() {
    let error = SyncError::Validation {
        path: "nginx/ubuntu/22.04.yaml".to_string(),
        errors: vec!["version must be a string".to_string()],
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("restored"));
    assert!(context.details.unwrap().contains("version must be a string"));
}

#[test]
fn test_error_context_network_error() {
    let error = SyncError::NetworkError("Connection timeout".to_string());
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("internet connection"));
    assert!(context.details.is_some());
}

#[test]
fn test_error_context_display_format() {
    let error = SyncError::UnknownRepository("apt-ubuntu-noble".to_string());
    let output = ErrorContext::new(&error).to_string();

    assert!(output.starts_with("Error: Unknown repository: apt-ubuntu-noble"));
    assert!(output.contains("Details:"));
    assert!(output.contains("Suggestion:"));
}

#[test]
fn test_format_error_without_color() {
    let error = SyncError::TargetUnreadable {
        path: "/srv/saidata".to_string(),
        message: "No such file or directory".to_string(),
    };
    let output = format_error_with_color(&error, false);

    assert!(output.starts_with("Error: Cannot read target /srv/saidata"));
    assert!(!output.contains("\x1b["));
    assert!(output.contains("• Verify that '/srv/saidata' exists"));
}

#[test]
fn test_format_error_with_color_resets() {
    let error = SyncError::NetworkError("refused".to_string());
    let output = format_error_with_color(&error, true);

    assert!(output.contains("\x1b[31m"));
    assert!(output.ends_with("\x1b[0m"));
}

#[test]
fn test_error_chain_names_repository() {
    let error = SyncError::RepositoryUnavailable {
        repository: "hashicorp-apt-ubuntu-jammy".to_string(),
        message: "HTTP 503".to_string(),
    };
    let output = format_error_chain(&error);

    assert!(output.starts_with("Error: Repository 'hashicorp-apt-ubuntu-jammy' is unavailable"));
    assert!(output.contains("\n  in repository 'hashicorp-apt-ubuntu-jammy'\n"));
}

#[derive(Debug, thiserror::Error)]
#[error("index download failed")]
struct DownloadFailed(#[source] std::io::Error);

#[test]
fn test_error_chain_lists_causes() {
    let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
    let error = SyncError::Io(std::io::Error::other(DownloadFailed(reset)));
    let output = format_error_chain(&error);

    assert!(output.starts_with("Error: index download failed"));
    assert!(output.contains("\n  caused by: connection reset"));
    assert!(error_subject(&error).is_none());
}

#[test]
fn test_error_subject_for_documents() {
    let error = SyncError::Validation {
        path: "nginx/ubuntu/22.04.yaml".to_string(),
        errors: vec!["version must be a string".to_string()],
    };
    assert_eq!(
        error_subject(&error).as_deref(),
        Some("document nginx/ubuntu/22.04.yaml")
    );
    assert!(format_error_with_color(&error, false).contains("  in document nginx/ubuntu/22.04.yaml"));
}

#[test]
fn test_filesystem_maps_permission_denied() {
    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let mapped = SyncError::filesystem(std::path::Path::new("/etc/x.yaml"), err);
    assert!(matches!(mapped, SyncError::PermissionDenied(ref p) if p == "/etc/x.yaml"));

    let err = std::io::Error::other("disk full");
    let mapped = SyncError::filesystem(std::path::Path::new("/tmp/y.yaml"), err);
    assert!(matches!(mapped, SyncError::Filesystem { .. }));
}

#[test]
fn test_soft_errors() {
    assert!(SyncError::NetworkError("x".into()).is_soft());
    assert!(
        SyncError::RepositoryUnavailable {
            repository: "r".into(),
            message: "m".into()
        }
        .is_soft()
    );
    assert!(
        !SyncError::Validation {
            path: "p".into(),
            errors: vec![]
        }
        .is_soft()
    );
    assert!(
        !SyncError::TargetUnreadable {
            path: "p".into(),
            message: "m".into()
        }
        .is_soft()
    );
}
