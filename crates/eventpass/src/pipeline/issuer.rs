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

//! The pass issuer: runs the stages for one or many tickets.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use uuid::Uuid;
use x509_cert::der::pem::LineEnding;
use x509_cert::der::EncodePem;

use super::error::{IssuanceError, IssuanceErrorKind};
use super::stages;
use super::state::{IssuanceState, PipelineStage};
use crate::config::{ConfigError, IssuerConfig};
use crate::content::{ResourceSource, TicketHolder};
use crate::crypto::{Certificate, IdentityError, Signature};
use crate::packaging::{ArchiveError, ArchivePackager, Manifest, ManifestBuilder};
use crate::security::{audit, IdentityProvider};

/// Everything needed to issue one pass.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    pub holder: TicketHolder,
    pub icon: ResourceSource,
    pub logo: ResourceSource,
    /// Destination of the `.pkpass` archive.
    pub output: PathBuf,
}

impl IssuanceRequest {
    pub fn new(
        holder: TicketHolder,
        icon: ResourceSource,
        logo: ResourceSource,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            holder,
            icon,
            logo,
            output: output.into(),
        }
    }
}

/// A successfully issued pass.
#[derive(Debug, Clone)]
pub struct IssuedPass {
    pub issuance_id: Uuid,
    /// Serial number, which is also the barcode payload used at redemption.
    pub serial_number: String,
    pub output: PathBuf,
    /// SHA256 of the archive file.
    pub archive_checksum: String,
    pub archive_size: u64,
    pub manifest: Manifest,
    pub signature: Signature,
    pub certificate_fingerprint: String,
    /// Certificate verifying the signature; distributed out-of-band.
    pub certificate: Certificate,
    pub issued_at: DateTime<Utc>,
}

impl IssuedPass {
    pub fn barcode_message(&self) -> &str {
        &self.serial_number
    }

    pub fn certificate_pem(&self) -> Result<String, IdentityError> {
        self.certificate
            .to_pem(LineEnding::LF)
            .map_err(|e| IdentityError::Certificate(e.to_string()))
    }
}

/// Issues passes for one issuer template and identity provider.
///
/// Content assembly, manifest construction and packaging run in order; the
/// signing identity is obtained concurrently with manifest construction and
/// the two are joined before signing.
pub struct PassIssuer {
    config: IssuerConfig,
    identity: Arc<dyn IdentityProvider>,
    manifest_builder: ManifestBuilder,
    packager: ArchivePackager,
}

impl std::fmt::Debug for PassIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassIssuer")
            .field("config", &self.config)
            .field("identity", &self.identity.kind())
            .finish()
    }
}

impl PassIssuer {
    pub fn new(config: IssuerConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let archive = *config.archive();
        Self {
            manifest_builder: ManifestBuilder::new(archive.digest),
            packager: ArchivePackager::new(archive.compression).with_overwrite(archive.overwrite),
            config,
            identity,
        }
    }

    /// Validate `config` and build the identity provider it describes.
    pub fn from_config(config: IssuerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let identity = config.identity().provider()?;
        Ok(Self::new(config, identity))
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn identity_provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Issue a single pass.
    ///
    /// # Errors
    ///
    /// Returns an [`IssuanceError`] naming the failed stage. No archive from
    /// this issuance is left at `request.output`; with overwrite enabled, a
    /// file previously at that path is removed as well.
    pub async fn issue(&self, request: IssuanceRequest) -> Result<IssuedPass, IssuanceError> {
        let issuance_id = Uuid::new_v4();
        let started = Instant::now();
        let serial_number = request.holder.serial_number.clone();
        let output = request.output.clone();
        let mut state = IssuanceState::Idle;

        tracing::debug!(
            issuance_id = %issuance_id,
            serial_number = %serial_number,
            identity = self.identity.kind(),
            "Starting issuance"
        );

        let result = self.run(issuance_id, request, &mut state).await;

        match &result {
            Ok(issued) => {
                metrics::counter!("eventpass_passes_issued_total").increment(1);
                metrics::histogram!("eventpass_issuance_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                audit::log_pass_issued(
                    &issuance_id.to_string(),
                    &issued.serial_number,
                    &issued.output.display().to_string(),
                    &issued.archive_checksum,
                    &issued.certificate_fingerprint,
                );
            }
            Err(err) => {
                if let Err(e) = state.advance(IssuanceState::Failed(err.stage)) {
                    tracing::debug!(error = %e, "Issuance already terminal");
                }
                if !matches!(
                    err.kind,
                    IssuanceErrorKind::PackagingFailure(ArchiveError::OutputExists(_))
                ) {
                    self.discard_stale_output(&output);
                }
                metrics::counter!(
                    "eventpass_issuance_failures_total",
                    "stage" => err.stage.as_str(),
                    "kind" => err.kind.as_str()
                )
                .increment(1);
                audit::log_pass_issue_failed(
                    &issuance_id.to_string(),
                    Some(&serial_number),
                    err.stage.as_str(),
                    &err.kind.to_string(),
                );
            }
        }

        result
    }

    /// Issue several passes with at most `max_concurrent_issuances` in flight.
    ///
    /// Results are returned in request order. One failure does not stop the
    /// rest of the batch.
    pub async fn issue_batch(
        &self,
        requests: Vec<IssuanceRequest>,
    ) -> Vec<Result<IssuedPass, IssuanceError>> {
        let limit = self.config.max_concurrent_issuances().max(1);
        let total = requests.len();
        tracing::info!(count = total, limit, "Starting batch issuance");

        let results: Vec<_> = stream::iter(requests)
            .map(|request| self.issue(request))
            .buffered(limit)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            count = total,
            issued = total - failed,
            failed,
            "Batch issuance finished"
        );
        results
    }

    async fn run(
        &self,
        issuance_id: Uuid,
        request: IssuanceRequest,
        state: &mut IssuanceState,
    ) -> Result<IssuedPass, IssuanceError> {
        let IssuanceRequest {
            holder,
            icon,
            logo,
            output,
        } = request;

        // Fail before key generation when the destination is already taken.
        self.packager
            .check_output(&output)
            .map_err(|e| IssuanceError::new(PipelineStage::Packaging, e))?;

        let content = stages::assemble_content(self.config.template(), &holder, icon, logo)?;
        advance(state, IssuanceState::ContentAssembled, PipelineStage::ContentAssembly)?;

        let builder = self.manifest_builder;
        let store = content.store;
        let manifest_task =
            tokio::task::spawn_blocking(move || stages::build_manifest(&builder, &store));
        let (manifest, identity) = tokio::join!(manifest_task, self.identity.signing_identity());

        let manifest = manifest.map_err(|e| {
            IssuanceError::new(
                PipelineStage::ManifestConstruction,
                IssuanceErrorKind::ResourceUnavailable(format!("manifest worker failed: {e}")),
            )
        })??;
        advance(state, IssuanceState::ManifestBuilt, PipelineStage::ManifestConstruction)?;

        let identity =
            identity.map_err(|e| IssuanceError::new(PipelineStage::IdentityAcquisition, e))?;

        let signed = stages::sign(manifest, &identity)?;
        audit::log_manifest_signed(
            &holder.serial_number,
            &signed.manifest_hash(),
            &signed.certificate_fingerprint,
        );
        advance(state, IssuanceState::Signed, PipelineStage::Signing)?;

        let packager = self.packager;
        let (signed, packaged) = tokio::task::spawn_blocking(move || {
            stages::package(&packager, &signed, &output).map(|packaged| (signed, packaged))
        })
        .await
        .map_err(|e| {
            IssuanceError::new(
                PipelineStage::Packaging,
                ArchiveError::Io(std::io::Error::other(format!("packaging worker failed: {e}"))),
            )
        })??;
        advance(state, IssuanceState::Packaged, PipelineStage::Packaging)?;

        tracing::debug!(
            issuance_id = %issuance_id,
            serial_number = %holder.serial_number,
            path = %packaged.path.display(),
            "Issuance packaged"
        );

        Ok(IssuedPass {
            issuance_id,
            serial_number: holder.serial_number,
            output: packaged.path,
            archive_checksum: packaged.checksum,
            archive_size: packaged.size,
            manifest: signed.manifest,
            signature: signed.signature,
            certificate_fingerprint: signed.certificate_fingerprint,
            certificate: identity.certificate().clone(),
            issued_at: Utc::now(),
        })
    }

    fn discard_stale_output(&self, output: &Path) {
        if !self.packager.overwrite() {
            return;
        }
        match std::fs::remove_file(output) {
            Ok(()) => tracing::warn!(
                path = %output.display(),
                "Removed previous archive at output path after failed issuance"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %output.display(),
                error = %e,
                "Failed to remove previous archive at output path"
            ),
        }
    }
}

fn advance(
    state: &mut IssuanceState,
    next: IssuanceState,
    stage: PipelineStage,
) -> Result<(), IssuanceError> {
    state
        .advance(next)
        .map_err(|e| IssuanceError::new(stage, e))
}
