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

//! Package version ordering shared by every index format.
//!
//! Versions are split into `[epoch:]upstream[-revision]` and compared the
//! way dpkg does: epochs numerically, then upstream, then revision, where a
//! `~` sorts before everything including the end of the string. RPM
//! `epoch:version-release`, Alpine `-rN` and pacman `-pkgrel` suffixes fit
//! the same shape.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageVersion<'a> {
    pub epoch: u64,
    pub upstream: &'a str,
    pub revision: &'a str,
}

impl<'a> PackageVersion<'a> {
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        let (epoch, rest) = match text.split_once(':') {
            Some((epoch, rest))
                if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) =>
            {
                (epoch.parse().unwrap_or(u64::MAX), rest)
            }
            _ => (0, text),
        };
        let (upstream, revision) = rest.rsplit_once('-').unwrap_or((rest, ""));

        Self {
            epoch,
            upstream,
            revision,
        }
    }
}

impl Ord for PackageVersion<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_fragment(self.upstream, other.upstream))
            .then_with(|| compare_fragment(self.revision, other.revision))
    }
}

impl PartialOrd for PackageVersion<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

/// Order two version strings published by a repository.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    PackageVersion::parse(a).cmp(&PackageVersion::parse(b))
}

/// Weight of a non-digit byte; `None` is the end of the fragment.
fn weight(byte: Option<u8>) -> i32 {
    match byte {
        None => 0,
        Some(b'~') => -1,
        Some(b) if b.is_ascii_alphabetic() => i32::from(b),
        Some(b) => i32::from(b) + 256,
    }
}

fn compare_fragment(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit prefix, byte by byte
        while a.get(i).is_some_and(|c| !c.is_ascii_digit())
            || b.get(j).is_some_and(|c| !c.is_ascii_digit())
        {
            let left = weight(a.get(i).copied().filter(|c| !c.is_ascii_digit()));
            let right = weight(b.get(j).copied().filter(|c| !c.is_ascii_digit()));
            if left != right {
                return left.cmp(&right);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        // Digit run: longer wins, otherwise the first differing digit
        let mut first_diff = Ordering::Equal;
        while let (Some(l), Some(r)) = (a.get(i), b.get(j)) {
            if !l.is_ascii_digit() || !r.is_ascii_digit() {
                break;
            }
            if first_diff == Ordering::Equal {
                first_diff = l.cmp(r);
            }
            i += 1;
            j += 1;
        }
        if a.get(i).is_some_and(u8::is_ascii_digit) {
            return Ordering::Greater;
        }
        if b.get(j).is_some_and(u8::is_ascii_digit) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
