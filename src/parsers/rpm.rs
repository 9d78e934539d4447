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

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, SyncError};
use crate::models::PackageRecord;

#[derive(Default)]
struct PendingPackage {
    name: Option<String>,
    arch: Option<String>,
    epoch: Option<String>,
    ver: Option<String>,
    rel: Option<String>,
}

#[derive(Clone, Copy)]
enum TextField {
    Name,
    Arch,
}

/// Parse a repodata `primary.xml` document.
pub fn parse(data: &[u8], include_release: bool, repository: &str) -> Result<Vec<PackageRecord>> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<PendingPackage> = None;
    let mut text_field: Option<TextField> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| SyncError::Parse {
            format: "rpm_primary_xml".to_string(),
            message: format!("at byte {}: {e}", reader.buffer_position()),
        })?;

        match event {
            Event::Start(ref e) if e.name().as_ref() == b"package" => {
                current = Some(PendingPackage::default());
            }
            Event::End(ref e) if e.name().as_ref() == b"package" => {
                if let Some(pending) = current.take()
                    && let Some(record) = finish(pending, include_release, repository)
                {
                    records.push(record);
                }
            }
            Event::Start(ref e) if current.is_some() => {
                text_field = match e.name().as_ref() {
                    b"name" => Some(TextField::Name),
                    b"arch" => Some(TextField::Arch),
                    _ => None,
                };
                if e.name().as_ref() == b"version" {
                    read_version(e, current.as_mut())?;
                }
            }
            Event::Empty(ref e) if e.name().as_ref() == b"version" => {
                read_version(e, current.as_mut())?;
            }
            Event::Text(ref e) => {
                if let (Some(field), Some(pending)) = (text_field, current.as_mut()) {
                    let text = e
                        .unescape()
                        .map_err(|err| SyncError::Parse {
                            format: "rpm_primary_xml".to_string(),
                            message: err.to_string(),
                        })?
                        .into_owned();
                    match field {
                        TextField::Name => pending.name = Some(text),
                        TextField::Arch => pending.arch = Some(text),
                    }
                }
            }
            Event::End(_) => text_field = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn read_version(element: &BytesStart<'_>, pending: Option<&mut PendingPackage>) -> Result<()> {
    let Some(pending) = pending else {
        return Ok(());
    };

    for attr in element.attributes() {
        let attr = attr.map_err(|e| SyncError::Parse {
            format: "rpm_primary_xml".to_string(),
            message: e.to_string(),
        })?;
        let value = attr
            .unescape_value()
            .map_err(|e| SyncError::Parse {
                format: "rpm_primary_xml".to_string(),
                message: e.to_string(),
            })?
            .into_owned();
        match attr.key.as_ref() {
            b"epoch" => pending.epoch = Some(value),
            b"ver" => pending.ver = Some(value),
            b"rel" => pending.rel = Some(value),
            _ => {}
        }
    }
    Ok(())
}

fn finish(
    pending: PendingPackage,
    include_release: bool,
    repository: &str,
) -> Option<PackageRecord> {
    let name = pending.name?;
    let ver = pending.ver?;

    let version = match (&pending.rel, include_release) {
        (Some(rel), true) => format!("{ver}-{rel}"),
        _ => ver,
    };

    let mut record = PackageRecord::new(name, version, repository);
    if let Some(arch) = pending.arch {
        record = record.with_field("arch", arch);
    }
    if let Some(epoch) = pending.epoch.filter(|e| e != "0") {
        record = record.with_field("epoch", epoch);
    }
    if let Some(rel) = pending.rel {
        record = record.with_field("release", rel);
    }
    Some(record)
}
