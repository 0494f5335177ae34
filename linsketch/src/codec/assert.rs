// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::error::Error;

pub(crate) fn insufficient_data(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |_| Error::insufficient_data(tag)
}

pub(crate) fn ensure_serial_version_is(expected: u8, actual: u8) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::unsupported_serial_version(expected, actual))
    }
}

pub(crate) fn ensure_register_tag_is(
    expected: u8,
    actual: u8,
    type_name: &'static str,
) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::deserial(format!(
            "register type mismatch: expected tag {expected} ({type_name}), got {actual}"
        )))
    }
}

/// Checks that `count` entries of `width` bytes each can still be read.
pub(crate) fn ensure_payload_len(
    count: u64,
    width: usize,
    remaining: usize,
    tag: &'static str,
) -> Result<usize, Error> {
    let count = usize::try_from(count)
        .map_err(|_| Error::deserial(format!("{tag} count {count} overflows usize")))?;
    let needed = count
        .checked_mul(width)
        .ok_or_else(|| Error::deserial(format!("{tag} size overflow")))?;
    if needed > remaining {
        return Err(Error::insufficient_data(format!(
            "{tag}: expected {needed} bytes, got {remaining}"
        )));
    }
    Ok(count)
}

pub(crate) fn ensure_fully_consumed(remaining: usize) -> Result<(), Error> {
    if remaining == 0 {
        Ok(())
    } else {
        Err(Error::deserial(format!(
            "{remaining} trailing bytes after payload"
        )))
    }
}
