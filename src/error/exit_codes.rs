// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::SyncError;

/// Exit code used when a batch completed but some files warned or failed.
pub const PARTIAL_SUCCESS_EXIT_CODE: i32 = 4;

pub fn get_exit_code(error: &SyncError) -> i32 {
    match error {
        SyncError::Configuration { .. }
        | SyncError::InvalidConfig(_)
        | SyncError::ConfigFile(_)
        | SyncError::Validation { .. }
        | SyncError::InvalidDocument { .. } => 2,

        SyncError::PackageNotFound { .. }
        | SyncError::UnknownRepository(_)
        | SyncError::Resolution { .. } => 3,

        SyncError::PermissionDenied(_) => 13,

        SyncError::NetworkError(_)
        | SyncError::Http(_)
        | SyncError::RepositoryUnavailable { .. } => 20,

        SyncError::TimedOut(_) => 62,

        SyncError::TargetUnreadable { .. } => 66, // EX_NOINPUT

        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_unreadable_is_distinct() {
        let error = SyncError::TargetUnreadable {
            path: "/missing".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(get_exit_code(&error), 66);
    }

    #[test]
    fn test_network_family_shares_code() {
        assert_eq!(get_exit_code(&SyncError::NetworkError("x".into())), 20);
        assert_eq!(
            get_exit_code(&SyncError::RepositoryUnavailable {
                repository: "apt-ubuntu-jammy".into(),
                message: "timeout".into(),
            }),
            20
        );
    }

    #[test]
    fn test_partial_success_code_not_reused() {
        let codes = [
            get_exit_code(&SyncError::InvalidConfig("x".into())),
            get_exit_code(&SyncError::PermissionDenied("x".into())),
            get_exit_code(&SyncError::Cache("x".into())),
        ];
        assert!(!codes.contains(&PARTIAL_SUCCESS_EXIT_CODE));
    }
}
