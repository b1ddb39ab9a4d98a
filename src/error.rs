/*
 *   Copyright (c) 2024 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

use std::fmt;

/// The error kinds an [`crate::Editor`] can surface. Lookups that merely probe for an
/// existing command or alias return [`Option`], not [`Result`] — "absent" is not an
/// error in this taxonomy, only a structurally broken table or a failed I/O operation
/// is.
#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad structure: {0}")]
    BadStructure(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("parse failure: {0}")]
    ParseFailure(String),
}

pub type EditorResult<T> = Result<T, EditorError>;

impl EditorError {
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        EditorError::InvalidArgument(msg.to_string())
    }

    pub fn not_found(msg: impl fmt::Display) -> Self { EditorError::NotFound(msg.to_string()) }

    pub fn bad_structure(msg: impl fmt::Display) -> Self {
        EditorError::BadStructure(msg.to_string())
    }

    pub fn parse_failure(msg: impl fmt::Display) -> Self {
        EditorError::ParseFailure(msg.to_string())
    }
}
