/*
 *  Copyright 2025 Eventpass Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! The issuance pipeline.
//!
//! This module provides:
//! - [`PassIssuer`] running issuances singly or in bounded batches
//! - [`stages`] exposing each stage as a standalone function
//! - [`IssuanceState`] and [`PipelineStage`] describing progress and failure
//! - [`IssuanceError`] naming the stage that failed

mod error;
mod issuer;
pub mod stages;
mod state;

pub use error::{IssuanceError, IssuanceErrorKind};
pub use issuer::{IssuanceRequest, IssuedPass, PassIssuer};
pub use stages::{AssembledContent, SignedManifest};
pub use state::{InvalidTransition, IssuanceState, PipelineStage};
